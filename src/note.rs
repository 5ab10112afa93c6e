//! Note identifiers and the mapping from a note to its delay-line length.

use std::fmt;

use crate::error::{Error, Result};

/// MIDI note number of the first A on a piano keyboard.
const OCTAVE_0: u8 = 21;
const SEMITONES: u8 = 12;

/// A MIDI note number inside the range of keys the piano models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note(u8);

impl Note {
    /// A1, the lowest modeled key.
    pub const MIN: u8 = OCTAVE_0 + SEMITONES;
    /// C7, three semitones past the start of octave 6.
    pub const MAX: u8 = OCTAVE_0 + 6 * SEMITONES + 3;

    pub fn new(number: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&number) {
            Ok(Self(number))
        } else {
            Err(Error::NoteOutOfRange(number))
        }
    }

    /// Every playable note, lowest first.
    pub fn all() -> impl Iterator<Item = Note> {
        (Self::MIN..=Self::MAX).map(Note)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Position of this note within [`Note::all`].
    pub fn index(self) -> usize {
        usize::from(self.0 - Self::MIN)
    }

    /// Equal-tempered frequency with A4 (note 69) at 440 Hz.
    pub fn frequency_hz(self) -> f32 {
        frequency_hz(self.0)
    }

    /// The number of samples in one period of this note, which is the length of the
    /// Karplus-Strong delay line that produces it.
    ///
    /// Fails if the sample rate is not a positive finite number, or if it is so low that
    /// the period would round to zero samples.
    pub fn delay_line_length(self, sample_rate: f32) -> Result<usize> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        let length = (sample_rate / self.frequency_hz()).round() as usize;
        if length == 0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        Ok(length)
    }
}

impl TryFrom<u8> for Note {
    type Error = Error;

    fn try_from(number: u8) -> Result<Self> {
        Note::new(number)
    }
}

impl From<Note> for u8 {
    fn from(note: Note) -> u8 {
        note.0
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        let octave = i32::from(self.0 / 12) - 1;
        write!(f, "{}{}", NAMES[usize::from(self.0 % 12)], octave)
    }
}

/// Equal-tempered frequency of any MIDI note number.
pub fn frequency_hz(number: u8) -> f32 {
    440.0 * 2.0_f32.powf((f32::from(number) - 69.0) / 12.0)
}
