//! In-place block processing applied after the strings have been mixed.

use std::f32::consts::PI;

use crate::{
    buffer::AudioBuffer,
    error::{Error, Result},
};

pub trait PostProcessor {
    /// Called whenever the sample rate or channel count changes. May allocate.
    ///
    /// An `Err` must leave the processor as it was.
    fn prepare(&mut self, sample_rate: f32, channels: usize) -> Result<()>;

    /// Transforms frames `start..start + num_samples` of every channel in place.
    ///
    /// Must not allocate or touch frames outside the range.
    fn process(&mut self, buffer: &mut AudioBuffer, start: usize, num_samples: usize);
}

/// Leaves the signal untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bypass;

impl PostProcessor for Bypass {
    fn prepare(&mut self, _sample_rate: f32, _channels: usize) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, _buffer: &mut AudioBuffer, _start: usize, _num_samples: usize) {}
}

/// Normalized coefficients of one direct-form-I section. First-order sections leave `b2` and
/// `a2` at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Section {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Section {
    /// A first-order low-pass by bilinear transform.
    fn first_order(cutoff: f32, sample_rate: f32) -> Self {
        let k = (PI * cutoff / sample_rate).tan();
        let norm = 1.0 / (1.0 + k);
        Self {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    /// A second-order low-pass with quality `q`.
    fn second_order(cutoff: f32, sample_rate: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl SectionState {
    #[inline]
    fn tick(&mut self, c: &Section, x: f32) -> f32 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// A Butterworth low-pass of any order, built from cascaded second-order sections plus one
/// first-order section when the order is odd.
#[derive(Debug, Clone)]
pub struct ButterworthLowPass {
    cutoff: f32,
    order: usize,
    sections: Vec<Section>,
    /// One run of section states per channel, laid out channel by channel.
    states: Vec<SectionState>,
}

impl ButterworthLowPass {
    pub const PIANO_CUTOFF: f32 = 5_000.0;
    pub const PIANO_ORDER: usize = 17;

    pub fn new(cutoff: f32, order: usize) -> Result<Self> {
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(Error::InvalidFilter("cutoff must be positive"));
        }
        if order == 0 {
            return Err(Error::InvalidFilter("order must be at least 1"));
        }
        Ok(Self {
            cutoff,
            order,
            sections: Vec::new(),
            states: Vec::new(),
        })
    }

    /// The 5 kHz, 17th-order filter that takes the edge off the strings' noise.
    pub fn piano() -> Self {
        Self {
            cutoff: Self::PIANO_CUTOFF,
            order: Self::PIANO_ORDER,
            sections: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Quality factors of the conjugate pole pairs.
    fn pole_pair_qs(order: usize) -> impl Iterator<Item = f32> {
        let n = order as f32;
        (0..order / 2).map(move |k| {
            let angle = if order % 2 == 0 {
                PI * (2 * k + 1) as f32 / (2.0 * n)
            } else {
                PI * (k + 1) as f32 / n
            };
            1.0 / (2.0 * angle.cos())
        })
    }
}

impl PostProcessor for ButterworthLowPass {
    fn prepare(&mut self, sample_rate: f32, channels: usize) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        if self.cutoff >= sample_rate / 2.0 {
            return Err(Error::InvalidFilter("cutoff must be below Nyquist"));
        }

        self.sections.clear();
        let cutoff = self.cutoff;
        self.sections.extend(
            Self::pole_pair_qs(self.order)
                .map(|q| Section::second_order(cutoff, sample_rate, q)),
        );
        if self.order % 2 == 1 {
            self.sections.push(Section::first_order(cutoff, sample_rate));
        }
        self.states.clear();
        self.states
            .resize(self.sections.len() * channels, SectionState::default());

        log::debug!(
            "low-pass at {} Hz uses {} sections on {} channels",
            self.cutoff,
            self.sections.len(),
            channels
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut AudioBuffer, start: usize, num_samples: usize) {
        let per_channel = self.sections.len();
        if per_channel == 0 {
            return;
        }
        for (channel, states) in buffer
            .channels_mut()
            .zip(self.states.chunks_exact_mut(per_channel))
        {
            for sample in &mut channel[start..start + num_samples] {
                *sample = self
                    .sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(*sample, |x, (section, state)| state.tick(section, x));
            }
        }
    }
}
