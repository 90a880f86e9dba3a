use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AssessmentId, ExerciseId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("assessment must contain at least one exercise")]
    NoExercises,

    #[error("exercise {0} appears more than once")]
    DuplicateExercise(ExerciseId),

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u8),
}

/// An ordered set of exercises a student attempts in one sitting.
///
/// `time_limit_secs` is advisory: it is shown to the student but never locks
/// an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    id: AssessmentId,
    title: String,
    exercise_ids: Vec<ExerciseId>,
    time_limit_secs: Option<u32>,
    passing_score: Option<u8>,
}

impl Assessment {
    /// Creates a new assessment.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if the title is blank, the exercise list is
    /// empty or repeats an exercise, or the passing score exceeds 100.
    pub fn new(
        id: AssessmentId,
        title: impl Into<String>,
        exercise_ids: Vec<ExerciseId>,
        time_limit_secs: Option<u32>,
        passing_score: Option<u8>,
    ) -> Result<Self, AssessmentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }
        if exercise_ids.is_empty() {
            return Err(AssessmentError::NoExercises);
        }
        let mut seen = BTreeSet::new();
        for id in &exercise_ids {
            if !seen.insert(*id) {
                return Err(AssessmentError::DuplicateExercise(*id));
            }
        }
        if let Some(score) = passing_score {
            if score > 100 {
                return Err(AssessmentError::InvalidPassingScore(score));
            }
        }

        Ok(Self {
            id,
            title,
            exercise_ids,
            time_limit_secs,
            passing_score,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn exercise_ids(&self) -> &[ExerciseId] {
        &self.exercise_ids
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn passing_score(&self) -> Option<u8> {
        self.passing_score
    }

    /// Whether a final score meets the passing mark, if one is set.
    #[must_use]
    pub fn passed(&self, total_score: u8) -> Option<bool> {
        self.passing_score.map(|mark| total_score >= mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ExerciseId> {
        raw.iter().copied().map(ExerciseId::new).collect()
    }

    #[test]
    fn rejects_empty_and_duplicate_exercise_lists() {
        let id = AssessmentId::new(1);
        assert_eq!(
            Assessment::new(id, "Quiz", Vec::new(), None, None).unwrap_err(),
            AssessmentError::NoExercises
        );
        assert_eq!(
            Assessment::new(id, "Quiz", ids(&[1, 2, 1]), None, None).unwrap_err(),
            AssessmentError::DuplicateExercise(ExerciseId::new(1))
        );
    }

    #[test]
    fn passing_mark_is_inclusive() {
        let a = Assessment::new(AssessmentId::new(1), "Quiz", ids(&[1]), Some(600), Some(60))
            .unwrap();
        assert_eq!(a.passed(60), Some(true));
        assert_eq!(a.passed(59), Some(false));
    }
}
