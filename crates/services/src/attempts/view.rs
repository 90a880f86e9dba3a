use assess_core::model::{AttemptId, QuestionView};
use serde::Serialize;
use serde_json::Value;

/// The question under the attempt's pointer, ready for rendering.
///
/// Never carries the solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSlot {
    pub attempt_id: AttemptId,
    /// Zero-based position in the attempt's question order.
    pub index: usize,
    pub total: usize,
    pub question: QuestionView,
    /// The buffered response, if any.
    pub answer: Option<Value>,
    /// Seconds left before the assessment's time limit; `None` when untimed.
    pub time_remaining_secs: Option<u64>,
}

impl QuestionSlot {
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }
}
