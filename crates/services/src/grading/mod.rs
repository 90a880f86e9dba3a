mod events;
mod service;
mod view;

pub use crate::error::GradingError;
pub use events::{BroadcastGradingEvents, GradeFinalized, GradingEvents};
pub use service::{GradingService, ManualGradeOutcome};
pub use view::{GradingRow, GradingSheet, ResultRow, StudentResult};
