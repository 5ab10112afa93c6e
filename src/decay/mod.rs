use crate::note::Note;

/// Synthesis coefficients of one string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayCoefficients {
    /// Weight `S` of the two-point averaging filter in the feedback loop:
    ///
    /// ```plaintext
    /// y[t] = S * x[t + 1] + (1 - S) * x[t]
    /// ```
    ///
    /// Lower values brighten the tone, higher values smooth it. Must be in `[0, 1]`.
    pub filter_blend: f32,
    /// Gain applied every trip around the delay line while the note sounds. Must be in `[0, 1]`.
    pub sustain: f32,
    /// Gain applied to the tail-off magnitude once per rendered block after release. Must be in
    /// `[0, 1]` and below `sustain`.
    pub release: f32,
}

impl DecayCoefficients {
    pub const fn new(filter_blend: f32, sustain: f32, release: f32) -> Self {
        Self {
            filter_blend,
            sustain,
            release,
        }
    }

    /// Whether the loop can never amplify and a release drains faster than sustain.
    pub fn is_stable(&self) -> bool {
        let unit = 0.0..=1.0;
        unit.contains(&self.filter_blend)
            && unit.contains(&self.sustain)
            && unit.contains(&self.release)
            && self.release < self.sustain
    }
}

pub trait DecayPolicy {
    /// The coefficients used to synthesize `note`. Must return the same value every time it is
    /// called with the same note.
    fn coefficients(&self, note: Note) -> DecayCoefficients;
}

impl<P: DecayPolicy + ?Sized> DecayPolicy for &P {
    fn coefficients(&self, note: Note) -> DecayCoefficients {
        (**self).coefficients(note)
    }
}

impl<P: DecayPolicy + ?Sized> DecayPolicy for Box<P> {
    fn coefficients(&self, note: Note) -> DecayCoefficients {
        (**self).coefficients(note)
    }
}

pub mod table;
