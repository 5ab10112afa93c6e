//! A single Karplus-Strong string, permanently bound to one key.

use crate::{
    buffer::AudioBuffer,
    decay::{DecayCoefficients, DecayPolicy},
    error::Result,
    excitation::Excitation,
    note::Note,
};

/// Tail-off magnitude below which a released string is considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceState {
    /// Not sounding.
    Idle,
    /// The key is down.
    Held,
    /// The key was released and the string is fading. Carries the remaining tail-off magnitude,
    /// starting at 1 and shrinking by the release coefficient once per rendered block.
    TailingOff(f32),
}

/// A voice that plays exactly one note. Every key on the piano is modeled separately, so a
/// voice is never reassigned to another note.
///
/// The delay line is a ring buffer whose length is one period of the note. Each sample, the
/// slot after the read position is replaced by a damped two-point average of itself and the
/// current slot, which is the feedback loop of the Karplus-Strong algorithm.
#[derive(Debug)]
pub struct StringVoice {
    note: Note,
    coefficients: DecayCoefficients,
    excitation: Excitation,
    sample_rate: f32,
    delay_line: Vec<f32>,
    /// The noise burst copied into the delay line on every note-on. Regenerated only when the
    /// delay line is resized, so repeated strikes of a key share one timbre.
    burst: Vec<f32>,
    position: usize,
    velocity: f32,
    prepared: bool,
    state: VoiceState,
}

impl StringVoice {
    /// Creates an unprepared voice for `note`. The coefficients are resolved here, once, because
    /// they never change for a given note.
    pub fn new(note: Note, policy: &impl DecayPolicy, excitation: Excitation) -> Self {
        Self {
            note,
            coefficients: policy.coefficients(note),
            excitation,
            sample_rate: 0.0,
            delay_line: Vec::new(),
            burst: Vec::new(),
            position: 0,
            velocity: 0.0,
            prepared: false,
            state: VoiceState::Idle,
        }
    }

    /// Sizes both buffers for `sample_rate`, silences the string and draws a new noise burst.
    ///
    /// This allocates, so it must run off the audio thread and finish before the next
    /// [`StringVoice::render`]. On error the voice is left unprepared.
    pub fn prepare(&mut self, sample_rate: f32) -> Result<()> {
        self.prepared = false;
        let length = self.note.delay_line_length(sample_rate)?;

        self.sample_rate = sample_rate;
        self.delay_line.clear();
        self.delay_line.resize(length, 0.0);
        self.burst.resize(length, 0.0);
        self.excitation.fill(&mut self.burst);
        self.position = 0;
        self.state = VoiceState::Idle;
        self.prepared = true;

        log::debug!(
            "prepared {} at {} Hz with a {}-sample delay line",
            self.note,
            sample_rate,
            length
        );
        Ok(())
    }

    /// Whether this voice is the one that plays `note`.
    #[inline]
    pub fn can_play(&self, note: u8) -> bool {
        note == self.note.number()
    }

    /// Plucks the string. `note` must be this voice's note and the voice must be prepared.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        debug_assert!(self.prepared, "note on before prepare");
        debug_assert!(
            self.can_play(note),
            "note {note} routed to the voice for {}",
            self.note
        );
        if !self.prepared {
            return;
        }

        self.velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        for (slot, sample) in self.delay_line.iter_mut().zip(&self.burst) {
            *slot = self.velocity * sample;
        }
        self.state = VoiceState::Held;
    }

    /// Releases the key. Without tail-off the string stops at once, otherwise it fades out over
    /// the following blocks.
    pub fn note_off(&mut self, allow_tail_off: bool) {
        self.state = match self.state {
            _ if !allow_tail_off => VoiceState::Idle,
            VoiceState::Held => VoiceState::TailingOff(1.0),
            state => state,
        };
    }

    /// Adds `num_samples` samples of this string to every channel of `output`, starting at frame
    /// `start`.
    pub fn render(&mut self, output: &mut AudioBuffer, start: usize, num_samples: usize) {
        debug_assert!(self.prepared, "render before prepare");
        if !self.prepared {
            return;
        }

        let tail_off = match self.state {
            VoiceState::Idle => return,
            VoiceState::Held => 1.0,
            VoiceState::TailingOff(magnitude) => {
                let magnitude = magnitude * self.coefficients.release;
                if magnitude < SILENCE_THRESHOLD {
                    self.state = VoiceState::Idle;
                    return;
                }
                self.state = VoiceState::TailingOff(magnitude);
                magnitude
            }
        };

        let DecayCoefficients {
            filter_blend,
            sustain,
            ..
        } = self.coefficients;
        let decay = sustain * tail_off;
        let length = self.delay_line.len();

        for frame in start..start + num_samples {
            let next = (self.position + 1) % length;
            let filtered = filter_blend * self.delay_line[next]
                + (1.0 - filter_blend) * self.delay_line[self.position];
            self.delay_line[next] = decay * filtered;

            output.add_to_all(frame, self.delay_line[self.position]);
            self.position = next;
        }
    }

    pub fn note(&self) -> Note {
        self.note
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Whether the string is making any sound.
    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Idle
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn coefficients(&self) -> DecayCoefficients {
        self.coefficients
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn delay_line(&self) -> &[f32] {
        &self.delay_line
    }

    pub fn burst(&self) -> &[f32] {
        &self.burst
    }
}
