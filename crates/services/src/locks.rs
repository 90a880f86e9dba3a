use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use assess_core::model::AttemptId;
use tokio::sync::OwnedMutexGuard;

/// Per-attempt critical sections.
///
/// Entries nobody holds are pruned on the next acquire, so the map only grows
/// with concurrently graded attempts.
#[derive(Debug, Default)]
pub(crate) struct AttemptLocks {
    inner: Mutex<HashMap<AttemptId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AttemptLocks {
    pub(crate) async fn acquire(&self, attempt_id: AttemptId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(attempt_id).or_default())
        };
        lock.lock_owned().await
    }
}
