use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExerciseId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("question index {index} is out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Where to move the question pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum Direction {
    Next,
    Previous,
    To(usize),
}

/// Question pointer plus cumulative time per question.
///
/// Time for the current question is only added when the student leaves it
/// (navigates away or submits). Counters never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTimer {
    order: Vec<ExerciseId>,
    pointer: usize,
    time_spent: BTreeMap<ExerciseId, u64>,
    #[serde(skip)]
    entered_at: Option<DateTime<Utc>>,
}

impl QuestionTimer {
    /// Start timing the first question in `order` at `now`.
    #[must_use]
    pub fn new(order: Vec<ExerciseId>, now: DateTime<Utc>) -> Self {
        Self {
            order,
            pointer: 0,
            time_spent: BTreeMap::new(),
            entered_at: Some(now),
        }
    }

    /// Rebuild a stopped timer from persisted parts.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::OutOfRange` if `pointer` does not address a question.
    pub fn from_persisted(
        order: Vec<ExerciseId>,
        pointer: usize,
        time_spent: BTreeMap<ExerciseId, u64>,
    ) -> Result<Self, TimerError> {
        if pointer >= order.len() {
            return Err(TimerError::OutOfRange {
                index: pointer,
                len: order.len(),
            });
        }
        let time_spent = time_spent
            .into_iter()
            .filter(|(id, _)| order.contains(id))
            .collect();
        Ok(Self {
            order,
            pointer,
            time_spent,
            entered_at: None,
        })
    }

    #[must_use]
    pub fn order(&self) -> &[ExerciseId] {
        &self.order
    }

    #[must_use]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn current(&self) -> Option<ExerciseId> {
        self.order.get(self.pointer).copied()
    }

    #[must_use]
    pub fn contains(&self, exercise_id: ExerciseId) -> bool {
        self.order.contains(&exercise_id)
    }

    #[must_use]
    pub fn time_spent(&self) -> &BTreeMap<ExerciseId, u64> {
        &self.time_spent
    }

    #[must_use]
    pub fn seconds_on(&self, exercise_id: ExerciseId) -> u64 {
        self.time_spent.get(&exercise_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        self.time_spent.values().copied().fold(0, u64::saturating_add)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.entered_at.is_some()
    }

    /// Move the pointer, crediting the question being left.
    ///
    /// `Next` on the last question and `Previous` on the first are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::OutOfRange` for a jump past the end.
    pub fn advance(&mut self, direction: Direction, now: DateTime<Utc>) -> Result<usize, TimerError> {
        let last = self.order.len().saturating_sub(1);
        let target = match direction {
            Direction::Next => (self.pointer + 1).min(last),
            Direction::Previous => self.pointer.saturating_sub(1),
            Direction::To(index) if index < self.order.len() => index,
            Direction::To(index) => {
                return Err(TimerError::OutOfRange {
                    index,
                    len: self.order.len(),
                });
            }
        };
        if target == self.pointer {
            return Ok(self.pointer);
        }

        self.credit_current(now);
        self.pointer = target;
        self.entered_at = Some(now);
        Ok(self.pointer)
    }

    /// Credit the current question and stop timing.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        self.credit_current(now);
        self.entered_at = None;
    }

    /// Start timing the current question again, e.g. after a reload.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.entered_at = Some(now);
    }

    /// Adopt a pointer and time map from a draft.
    ///
    /// Counters merge by maximum so restoring an older draft cannot lower
    /// time already recorded. Entries for questions outside this timer are dropped.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::OutOfRange` if `pointer` does not address a question.
    pub fn restore(
        &mut self,
        pointer: usize,
        time_spent: &BTreeMap<ExerciseId, u64>,
        now: DateTime<Utc>,
    ) -> Result<(), TimerError> {
        if pointer >= self.order.len() {
            return Err(TimerError::OutOfRange {
                index: pointer,
                len: self.order.len(),
            });
        }
        for (id, secs) in time_spent {
            if !self.order.contains(id) {
                continue;
            }
            let slot = self.time_spent.entry(*id).or_insert(0);
            *slot = (*slot).max(*secs);
        }
        self.pointer = pointer;
        self.entered_at = Some(now);
        Ok(())
    }

    fn credit_current(&mut self, now: DateTime<Utc>) {
        let (Some(entered_at), Some(current)) = (self.entered_at, self.current()) else {
            return;
        };
        let elapsed = u64::try_from(now.signed_duration_since(entered_at).num_seconds()).unwrap_or(0);
        let slot = self.time_spent.entry(current).or_insert(0);
        *slot = slot.saturating_add(elapsed);
        self.entered_at = Some(now);
    }
}
