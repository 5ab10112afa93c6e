use thiserror::Error;

use crate::note::Note;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("note {0} is outside the playable range {min}..={max}", min = Note::MIN, max = Note::MAX)]
    NoteOutOfRange(u8),

    #[error("sample rate {0} Hz cannot drive a delay line")]
    InvalidSampleRate(f32),

    #[error("invalid decay policy: {0}")]
    InvalidPolicy(&'static str),

    #[error("invalid filter: {0}")]
    InvalidFilter(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
