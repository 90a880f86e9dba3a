#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod model;
pub mod score;
pub mod time;

pub use catalog::{ExerciseCatalog, ExerciseCategory, ExerciseType};
pub use error::Error;
pub use time::Clock;
