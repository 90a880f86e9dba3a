#![forbid(unsafe_code)]

pub mod attempts;
pub mod config;
pub mod engine;
pub mod error;
pub mod exercise_service;
pub mod grading;
mod locks;
pub mod progress;

pub use assess_core::Clock;

pub use attempts::{
    AttemptSessionService, AutosaveHandle, Autosaver, QuestionSlot, StartedAttempt, SubmitOutcome,
};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AuthoringError, ConfigError, EngineError, GradingError, SessionError};
pub use exercise_service::{AssessmentDraft, CheckReport, ContentBundle, ExerciseService, ImportSummary};
pub use grading::{
    BroadcastGradingEvents, GradeFinalized, GradingEvents, GradingService, GradingSheet,
    ManualGradeOutcome, StudentResult,
};
pub use progress::{AttemptProgress, CohortProgress, ProgressService};
