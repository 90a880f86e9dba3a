//! Read-side projections over attempts. Nothing here owns state.

use std::collections::BTreeSet;
use std::sync::Arc;

use assess_core::model::{AssessmentId, Attempt, AttemptId, AttemptStatus, StudentId};
use assess_core::score::{aggregate_score, percent};
use serde::Serialize;
use storage::repository::{AssessmentRepository, AttemptRepository, StorageError};

/// How far one attempt has come.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptProgress {
    pub attempt_id: AttemptId,
    pub status: AttemptStatus,
    pub total: usize,
    pub answered: usize,
    pub graded: usize,
    pub percent_answered: u8,
    pub percent_graded: u8,
}

impl AttemptProgress {
    #[must_use]
    pub fn of(attempt: &Attempt) -> Self {
        let total = attempt.exercise_ids().len();
        let answered = attempt.answered_count();
        let graded = attempt.graded_count();
        Self {
            attempt_id: attempt.id(),
            status: attempt.status(),
            total,
            answered,
            graded,
            percent_answered: percent(answered, total),
            percent_graded: percent(graded, total),
        }
    }
}

/// Submission statistics for one assessment across a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortProgress {
    pub assessment_id: AssessmentId,
    pub roster_size: usize,
    /// Students with at least one attempt.
    pub started: usize,
    /// Students with at least one submitted or graded attempt.
    pub submitted: usize,
    /// Students with at least one graded attempt.
    pub graded: usize,
    pub submission_rate: u8,
    /// Mean total score over graded attempts, halves rounded up.
    pub average_score: Option<u8>,
}

impl CohortProgress {
    #[must_use]
    pub fn of(assessment_id: AssessmentId, roster_size: usize, attempts: &[Attempt]) -> Self {
        let students = |keep: fn(&Attempt) -> bool| {
            attempts
                .iter()
                .filter(|a| keep(a))
                .map(Attempt::student_id)
                .collect::<BTreeSet<StudentId>>()
                .len()
        };
        let started = students(|_| true);
        let submitted = students(|a| a.status().is_terminal());
        let graded = students(|a| a.status() == AttemptStatus::Graded);

        let scores: Vec<u64> = attempts
            .iter()
            .filter(|a| a.status() == AttemptStatus::Graded)
            .filter_map(Attempt::total_score)
            .map(u64::from)
            .collect();
        let count = u64::try_from(scores.len()).unwrap_or(u64::MAX);
        let average_score = aggregate_score(scores.iter().sum(), count.saturating_mul(100));

        Self {
            assessment_id,
            roster_size,
            started,
            submitted,
            graded,
            submission_rate: percent(submitted, roster_size),
            average_score,
        }
    }
}

pub struct ProgressService {
    assessments: Arc<dyn AssessmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        assessments: Arc<dyn AssessmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            assessments,
            attempts,
        }
    }

    /// Progress of a persisted attempt. Live buffers are reported by the
    /// session manager instead.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown attempts.
    pub async fn attempt_progress(&self, attempt_id: AttemptId) -> Result<AttemptProgress, StorageError> {
        let attempt = self.attempts.get_attempt(attempt_id).await?;
        Ok(AttemptProgress::of(&attempt))
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown assessments.
    pub async fn cohort_progress(
        &self,
        assessment_id: AssessmentId,
        roster_size: usize,
    ) -> Result<CohortProgress, StorageError> {
        self.assessments.get_assessment(assessment_id).await?;
        let attempts = self.attempts.list_attempts(assessment_id).await?;
        Ok(CohortProgress::of(assessment_id, roster_size, &attempts))
    }
}
