use assess_core::model::AttemptId;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Emitted once per finalization (and again when a graded attempt is re-graded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeFinalized {
    pub attempt_id: AttemptId,
    pub total_score: u8,
}

/// Downstream sink for grading notifications.
///
/// Delivery is best effort: a failing subscriber never blocks finalization.
#[async_trait]
pub trait GradingEvents: Send + Sync {
    async fn grade_finalized(&self, event: GradeFinalized);
}

/// Fans events out to any number of in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastGradingEvents {
    sender: broadcast::Sender<GradeFinalized>,
}

impl BroadcastGradingEvents {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GradeFinalized> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastGradingEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl GradingEvents for BroadcastGradingEvents {
    async fn grade_finalized(&self, event: GradeFinalized) {
        if self.sender.send(event).is_err() {
            debug!(attempt_id = %event.attempt_id, "no grading subscribers");
        }
    }
}
