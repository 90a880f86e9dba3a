mod answer;
mod assessment;
mod attempt;
mod draft;
mod exercise;
mod ids;
mod timer;

pub use answer::{Answer, GradeSource, clamp_points};
pub use assessment::{Assessment, AssessmentError};
pub use attempt::{Attempt, AttemptError, AttemptStatus};
pub use draft::{DRAFT_FORMAT_VERSION, Draft, DraftError};
pub use exercise::{Difficulty, Exercise, ExerciseDraft, ExerciseError, LocalizedText, QuestionView};
pub use ids::{AssessmentId, AttemptId, ExerciseId, ParseIdError, StudentId};
pub use timer::{Direction, QuestionTimer, TimerError};
