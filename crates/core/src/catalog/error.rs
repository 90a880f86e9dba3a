use std::fmt;

use thiserror::Error;

use super::ExerciseType;

/// Which half of an exercise payload a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Content,
    Solution,
    Answer,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Payload::Content => "content",
            Payload::Solution => "solution",
            Payload::Answer => "answer",
        })
    }
}

/// A payload does not conform to its exercise type's schema.
///
/// Raised synchronously and never persisted; the caller can correct the
/// payload and try again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("malformed {payload}: {reason}")]
    Malformed { payload: Payload, reason: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} index {index} is out of range (len {len})")]
    IndexOutOfRange {
        field: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} lists index {index} more than once")]
    Duplicate { field: &'static str, index: usize },

    #[error("{field} exceeds the limit of {max}")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Registry misuse or corrupt authored data.
///
/// These indicate an authoring or registration bug rather than something a
/// student can fix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("unknown exercise type: {0}")]
    UnknownExerciseType(String),

    #[error("exercise type {0} is not autogradable")]
    NotAutogradable(ExerciseType),

    #[error("stored {exercise_type} exercise is invalid: {source}")]
    InvalidExercise {
        exercise_type: ExerciseType,
        #[source]
        source: ValidationError,
    },
}
