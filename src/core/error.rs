use thiserror::Error;

/// Failures raised by the neutral model and its timing/pitch utilities.
///
/// Plugins wrap these in `anyhow` errors together with their own context.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("tempo list is empty")]
    EmptyTempoList,

    #[error("first tempo is at tick {position}, expected tick 0")]
    MissingInitialTempo { position: i32 },

    #[error("tempo at tick {position} has a non-positive bpm ({bpm})")]
    NonPositiveBpm { position: i32, bpm: f64 },

    #[error("tempo #{index} is positioned before its predecessor")]
    TempoOutOfOrder { index: usize },

    #[error("time signature list is empty")]
    EmptyTimeSignatureList,

    #[error("invalid time signature {numerator}/{denominator} at bar {bar_index}")]
    InvalidTimeSignature {
        bar_index: i32,
        numerator: i32,
        denominator: i32,
    },

    #[error("time signature #{index} is positioned before its predecessor")]
    TimeSignatureOutOfOrder { index: usize },

    #[error("note #{index} overlaps the previous note")]
    NotesOverlapped { index: usize },

    #[error("project contains no singing track")]
    NoSingingTrack,

    #[error("projects must share the same tempo and time signature lists to be merged")]
    ProjectMismatch,
}

pub type Result<T> = std::result::Result<T, Error>;
