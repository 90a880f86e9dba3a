//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use assess_core::catalog::{CatalogError, ValidationError};
use assess_core::model::{
    AssessmentError, AssessmentId, AttemptError, DraftError, ExerciseError, ExerciseId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the grading pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradingError {
    #[error("grading incomplete, unresolved exercises: {unresolved:?}")]
    IncompleteGrading { unresolved: Vec<ExerciseId> },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the attempt session manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("answer for exercise {exercise_id} rejected: {source}")]
    InvalidAnswer {
        exercise_id: ExerciseId,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while importing authored content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthoringError {
    #[error("exercise {id} is invalid: {source}")]
    InvalidExercise {
        id: ExerciseId,
        #[source]
        source: ExerciseError,
    },
    #[error("assessment {id} is invalid: {source}")]
    InvalidAssessment {
        id: AssessmentId,
        #[source]
        source: AssessmentError,
    },
    #[error("assessment {assessment_id} references unknown exercise {exercise_id}")]
    MissingExercise {
        assessment_id: AssessmentId,
        exercise_id: ExerciseId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading `EngineConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors emitted while bootstrapping the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
