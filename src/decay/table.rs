use std::ops::RangeInclusive;

use crate::{
    error::{Error, Result},
    note::Note,
};

use super::{DecayCoefficients, DecayPolicy};

/// Coefficients shared by a contiguous range of MIDI notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub notes: RangeInclusive<u8>,
    pub coefficients: DecayCoefficients,
}

impl Band {
    pub const fn new(notes: RangeInclusive<u8>, coefficients: DecayCoefficients) -> Self {
        Self {
            notes,
            coefficients,
        }
    }

    pub fn contains(&self, note: Note) -> bool {
        self.notes.contains(&note.number())
    }
}

const PIANO_RELEASE: f32 = 0.992;

/// Bass, middle and treble bands of the piano voice.
///
/// Low strings get a bright transient and a slightly shorter sustain. The treble is smoothed
/// harder. Release damping is the same everywhere.
///
/// The bass band ends below [`Note::MIN`], so the playable keys only use the other two.
pub const PIANO_BANDS: [Band; 3] = [
    Band::new(0..=27, DecayCoefficients::new(0.43, 0.997, PIANO_RELEASE)),
    Band::new(28..=80, DecayCoefficients::new(0.7, 0.997, PIANO_RELEASE)),
    Band::new(81..=127, DecayCoefficients::new(0.85, 0.9992, PIANO_RELEASE)),
];

/// A decay policy looked up from an ordered table of note bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandedDecay {
    bands: Vec<Band>,
}

impl BandedDecay {
    /// Builds a table from bands sorted by note, which must not overlap and must together cover
    /// every playable note.
    pub fn new(bands: Vec<Band>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::InvalidPolicy("no bands"));
        }
        if bands.iter().any(|band| band.notes.is_empty()) {
            return Err(Error::InvalidPolicy("empty band"));
        }
        if bands.iter().any(|band| !band.coefficients.is_stable()) {
            return Err(Error::InvalidPolicy("coefficients out of range"));
        }
        if bands
            .windows(2)
            .any(|pair| pair[0].notes.end() >= pair[1].notes.start())
        {
            return Err(Error::InvalidPolicy("bands overlap or are out of order"));
        }
        if Note::all().any(|note| !bands.iter().any(|band| band.contains(note))) {
            return Err(Error::InvalidPolicy("a playable note has no band"));
        }
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }
}

impl Default for BandedDecay {
    fn default() -> Self {
        Self {
            bands: PIANO_BANDS.to_vec(),
        }
    }
}

impl DecayPolicy for BandedDecay {
    fn coefficients(&self, note: Note) -> DecayCoefficients {
        // Every playable note is covered, checked in `new`.
        self.bands
            .iter()
            .find(|band| band.contains(note))
            .map_or(FlatDecay::COEFFICIENTS, |band| band.coefficients)
    }
}

/// One set of coefficients for the whole keyboard.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlatDecay;

impl FlatDecay {
    pub const COEFFICIENTS: DecayCoefficients = DecayCoefficients::new(0.5, 0.998, 0.98);
}

impl DecayPolicy for FlatDecay {
    fn coefficients(&self, _note: Note) -> DecayCoefficients {
        Self::COEFFICIENTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(number: u8) -> Note {
        Note::new(number).unwrap()
    }

    #[test]
    fn piano_bands() {
        let policy = BandedDecay::default();
        assert_eq!(
            policy.coefficients(note(33)),
            DecayCoefficients::new(0.7, 0.997, 0.992)
        );
        assert_eq!(policy.coefficients(note(80)).filter_blend, 0.7);
        assert_eq!(
            policy.coefficients(note(81)),
            DecayCoefficients::new(0.85, 0.9992, 0.992)
        );
        assert_eq!(policy.coefficients(note(96)).filter_blend, 0.85);
        assert_eq!(policy.bands()[0].coefficients.filter_blend, 0.43);
    }

    #[test]
    fn treble_is_smoother_and_release_is_shared() {
        let policy = BandedDecay::default();
        let mid = policy.coefficients(note(60));
        let treble = policy.coefficients(note(90));
        assert!(treble.filter_blend > mid.filter_blend);
        assert_eq!(treble.release, mid.release);
        for band in policy.bands() {
            assert!(band.coefficients.release < band.coefficients.sustain);
        }
    }

    #[test]
    fn every_note_is_stable_under_both_policies() {
        let banded = BandedDecay::default();
        for n in Note::all() {
            assert!(banded.coefficients(n).is_stable(), "{n}");
            assert!(FlatDecay.coefficients(n).is_stable(), "{n}");
        }
    }

    #[test]
    fn custom_tables_are_validated() {
        let ok = DecayCoefficients::new(0.5, 0.99, 0.9);
        assert!(BandedDecay::new(vec![Band::new(0..=127, ok)]).is_ok());
        assert_eq!(
            BandedDecay::new(vec![]),
            Err(Error::InvalidPolicy("no bands"))
        );
        assert!(BandedDecay::new(vec![Band::new(0..=60, ok)]).is_err());
        assert!(
            BandedDecay::new(vec![Band::new(0..=60, ok), Band::new(60..=127, ok)]).is_err()
        );
        let amplifying = DecayCoefficients::new(0.5, 1.01, 0.9);
        assert!(BandedDecay::new(vec![Band::new(0..=127, amplifying)]).is_err());
        let slow_release = DecayCoefficients::new(0.5, 0.99, 0.995);
        assert!(BandedDecay::new(vec![Band::new(0..=127, slow_release)]).is_err());
    }
}
