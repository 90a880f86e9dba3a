use std::sync::Arc;
use std::time::Duration;

use assess_core::model::AttemptId;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::service::AttemptSessionService;

/// Periodic draft snapshots for one open attempt.
pub struct Autosaver;

impl Autosaver {
    /// Spawn a task that snapshots the attempt every `every`.
    ///
    /// The task ends on its own once the attempt is no longer in progress;
    /// dropping the handle stops it earlier. Must be called inside a tokio
    /// runtime.
    #[must_use]
    pub fn spawn(
        sessions: Arc<AttemptSessionService>,
        attempt_id: AttemptId,
        every: Duration,
    ) -> AutosaveHandle {
        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match sessions.snapshot_draft(attempt_id).await {
                    Ok(Some(_)) => debug!(%attempt_id, "autosaved"),
                    Ok(None) => {
                        info!(%attempt_id, "autosave stopped, attempt no longer in progress");
                        break;
                    }
                    Err(e) => warn!(%attempt_id, error = %e, "autosave failed"),
                }
            }
        });
        AutosaveHandle { attempt_id, task }
    }
}

/// Owns the autosave task; aborts it on drop.
#[derive(Debug)]
pub struct AutosaveHandle {
    attempt_id: AttemptId,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    /// `true` once the task has stopped by itself.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
