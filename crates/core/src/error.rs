use thiserror::Error;

use crate::catalog::{CatalogError, ValidationError};
use crate::model::{
    AssessmentError, AttemptError, DraftError, ExerciseError, ParseIdError, TimerError,
};

/// Any failure raised by the domain layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
