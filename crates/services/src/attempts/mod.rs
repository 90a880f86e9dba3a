mod autosave;
mod service;
mod view;

pub use crate::error::SessionError;
pub use autosave::{AutosaveHandle, Autosaver};
pub use service::{AttemptSessionService, StartedAttempt, SubmitOutcome};
pub use view::QuestionSlot;
