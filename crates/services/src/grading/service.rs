use std::collections::BTreeMap;
use std::sync::Arc;

use assess_core::model::{Attempt, AttemptError, AttemptId, AttemptStatus, Exercise, ExerciseId};
use assess_core::score::ScoreSummary;
use assess_core::time::Clock;
use assess_core::ExerciseCatalog;
use storage::repository::{AssessmentRepository, AttemptRepository, ExerciseRepository};
use tracing::{debug, info};

use super::events::{GradeFinalized, GradingEvents};
use super::view::{GradingRow, GradingSheet, ResultRow, StudentResult};
use crate::error::GradingError;
use crate::locks::AttemptLocks;

/// Result of a grader awarding points to one exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualGradeOutcome {
    pub points_awarded: u32,
    pub summary: ScoreSummary,
}

/// Turns submitted attempts into graded ones.
///
/// Every operation on an attempt runs inside that attempt's critical section,
/// and each one re-reads the attempt, so retries converge on the same state.
pub struct GradingService {
    clock: Clock,
    catalog: ExerciseCatalog,
    exercises: Arc<dyn ExerciseRepository>,
    assessments: Arc<dyn AssessmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
    events: Arc<dyn GradingEvents>,
    locks: AttemptLocks,
}

impl GradingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exercises: Arc<dyn ExerciseRepository>,
        assessments: Arc<dyn AssessmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
        events: Arc<dyn GradingEvents>,
    ) -> Self {
        Self {
            clock,
            catalog: ExerciseCatalog::new(),
            exercises,
            assessments,
            attempts,
            events,
            locks: AttemptLocks::default(),
        }
    }

    /// Grade every autogradable answer; manual-only answers stay unresolved.
    ///
    /// A graded attempt is left untouched; use [`GradingService::regrade`] for that.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::Attempt` for attempts still in progress,
    /// `GradingError::Catalog` if a stored exercise is corrupt, or storage errors.
    pub async fn auto_grade(&self, attempt_id: AttemptId) -> Result<ScoreSummary, GradingError> {
        let _guard = self.locks.acquire(attempt_id).await;
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        let max_points = max_points(&exercises);

        match attempt.status() {
            AttemptStatus::InProgress => {
                return Err(AttemptError::NotSubmitted(attempt.status()).into());
            }
            AttemptStatus::Graded => return Ok(attempt.score_summary(&max_points)),
            AttemptStatus::Submitted => {}
        }

        let graded = self.apply_auto_grades(&mut attempt, &exercises)?;
        let summary = attempt.rescore(&max_points);
        self.attempts.save_attempt(&attempt).await?;

        info!(
            %attempt_id,
            graded,
            unresolved = summary.unresolved.len(),
            "auto-grading done"
        );
        Ok(summary)
    }

    /// Award manual points to one exercise; the aggregate is recomputed at once.
    ///
    /// Points are clamped into `[0, exercise.points]`. Setting the same value
    /// twice leaves the attempt unchanged.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::Attempt` if the attempt is not `Submitted` or the
    /// exercise is not part of it, or storage errors.
    pub async fn manual_grade(
        &self,
        attempt_id: AttemptId,
        exercise_id: ExerciseId,
        points: i64,
        feedback: Option<String>,
    ) -> Result<ManualGradeOutcome, GradingError> {
        let _guard = self.locks.acquire(attempt_id).await;
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        if !attempt.exercise_ids().contains(&exercise_id) {
            return Err(AttemptError::UnknownExercise(exercise_id).into());
        }
        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        let max_points = max_points(&exercises);
        let max = max_points.get(&exercise_id).copied().unwrap_or(0);

        let points_awarded = attempt.apply_manual_grade(exercise_id, points, max, feedback)?;
        let summary = attempt.rescore(&max_points);
        self.attempts.save_attempt(&attempt).await?;

        debug!(%attempt_id, %exercise_id, points, points_awarded, "manual grade recorded");
        Ok(ManualGradeOutcome {
            points_awarded,
            summary,
        })
    }

    /// Lock in the total score and notify downstream.
    ///
    /// Finalizing an already graded attempt returns the stored score without
    /// emitting a second event.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::IncompleteGrading` listing unresolved exercises,
    /// `GradingError::Attempt` for attempts still in progress, or storage errors.
    pub async fn finalize_grading(
        &self,
        attempt_id: AttemptId,
        overall_feedback: Option<String>,
    ) -> Result<u8, GradingError> {
        let _guard = self.locks.acquire(attempt_id).await;
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        if attempt.status() == AttemptStatus::Graded {
            if let Some(total) = attempt.total_score() {
                debug!(%attempt_id, total, "attempt already graded");
                return Ok(total);
            }
        }

        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        let total = match attempt.finalize(&max_points(&exercises), overall_feedback, self.clock.now())
        {
            Ok(total) => total,
            Err(AttemptError::IncompleteGrading { unresolved }) => {
                return Err(GradingError::IncompleteGrading { unresolved });
            }
            Err(other) => return Err(other.into()),
        };
        self.attempts.save_attempt(&attempt).await?;

        info!(%attempt_id, total, "grading finalized");
        self.events
            .grade_finalized(GradeFinalized {
                attempt_id,
                total_score: total,
            })
            .await;
        Ok(total)
    }

    /// Re-derive auto grades after a content fix.
    ///
    /// Manual grades are kept. When the attempt is already graded the total is
    /// recomputed and the finalization event is emitted again.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::Attempt` for attempts still in progress,
    /// `GradingError::Catalog` if a stored exercise is corrupt, or storage errors.
    pub async fn regrade(&self, attempt_id: AttemptId) -> Result<ScoreSummary, GradingError> {
        let _guard = self.locks.acquire(attempt_id).await;
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        if attempt.status() == AttemptStatus::InProgress {
            return Err(AttemptError::NotSubmitted(attempt.status()).into());
        }

        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        let previous = attempt.total_score();
        self.apply_auto_grades(&mut attempt, &exercises)?;
        let summary = attempt.rescore(&max_points(&exercises));
        self.attempts.save_attempt(&attempt).await?;

        info!(
            %attempt_id,
            previous = ?previous,
            current = ?summary.total_score,
            "attempt re-graded"
        );
        if attempt.status() == AttemptStatus::Graded {
            if let Some(total_score) = summary.total_score {
                self.events
                    .grade_finalized(GradeFinalized {
                        attempt_id,
                        total_score,
                    })
                    .await;
            }
        }
        Ok(summary)
    }

    /// Expected-vs-submitted rows for the grader.
    ///
    /// # Errors
    ///
    /// Returns storage errors, including `NotFound` for unknown attempts.
    pub async fn grading_sheet(&self, attempt_id: AttemptId) -> Result<GradingSheet, GradingError> {
        let attempt = self.attempts.get_attempt(attempt_id).await?;
        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;

        let rows = exercises
            .iter()
            .map(|exercise| {
                let answer = attempt.answer(exercise.id());
                GradingRow {
                    exercise_id: exercise.id(),
                    exercise_type: exercise.exercise_type(),
                    title: exercise.title().clone(),
                    max_points: exercise.points(),
                    autogradable: self.catalog.describe(exercise.exercise_type()).autogradable,
                    submitted: answer.map(|a| a.response().clone()).unwrap_or_default(),
                    expected: exercise.solution().clone(),
                    points_awarded: answer.and_then(|a| a.points_awarded()),
                    is_correct: answer.and_then(|a| a.is_correct()),
                    feedback: answer.and_then(|a| a.feedback()).map(str::to_owned),
                    graded_by: answer.and_then(|a| a.graded_by()),
                    resolved: answer.is_some_and(|a| a.is_resolved()),
                }
            })
            .collect();

        Ok(GradingSheet {
            attempt_id,
            student_id: attempt.student_id(),
            status: attempt.status(),
            rows,
            summary: attempt.score_summary(&max_points(&exercises)),
        })
    }

    /// What the student may see about their attempt.
    ///
    /// Points and feedback are always included; solutions only once graded.
    ///
    /// # Errors
    ///
    /// Returns storage errors, including `NotFound` for unknown attempts.
    pub async fn student_result(&self, attempt_id: AttemptId) -> Result<StudentResult, GradingError> {
        let attempt = self.attempts.get_attempt(attempt_id).await?;
        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        let assessment = self.assessments.get_assessment(attempt.assessment_id()).await?;
        let reveal = attempt.status() == AttemptStatus::Graded;

        let rows = exercises
            .iter()
            .map(|exercise| {
                let answer = attempt.answer(exercise.id());
                ResultRow {
                    exercise_id: exercise.id(),
                    title: exercise.title().clone(),
                    max_points: exercise.points(),
                    submitted: answer.map(|a| a.response().clone()).unwrap_or_default(),
                    points_awarded: answer.and_then(|a| a.points_awarded()),
                    is_correct: answer.and_then(|a| a.is_correct()),
                    feedback: answer.and_then(|a| a.feedback()).map(str::to_owned),
                    solution: reveal.then(|| exercise.solution().clone()),
                }
            })
            .collect();

        let total_score = attempt.total_score().filter(|_| reveal);
        Ok(StudentResult {
            attempt_id,
            status: attempt.status(),
            total_score,
            passed: total_score.and_then(|score| assessment.passed(score)),
            overall_feedback: attempt.overall_feedback().map(str::to_owned),
            rows,
        })
    }

    fn apply_auto_grades(
        &self,
        attempt: &mut Attempt,
        exercises: &[Exercise],
    ) -> Result<usize, GradingError> {
        let mut graded = 0;
        for exercise in exercises {
            if !self.catalog.describe(exercise.exercise_type()).autogradable {
                continue;
            }
            let response = attempt
                .answer(exercise.id())
                .and_then(|a| a.response_opt())
                .cloned();
            let grade = self.catalog.autograde(
                exercise.exercise_type(),
                exercise.content(),
                exercise.solution(),
                response.as_ref(),
                exercise.points(),
            )?;
            if attempt.apply_auto_grade(exercise.id(), grade, exercise.points())? {
                graded += 1;
            }
        }
        Ok(graded)
    }
}

fn max_points(exercises: &[Exercise]) -> BTreeMap<ExerciseId, u32> {
    exercises.iter().map(|e| (e.id(), e.points())).collect()
}
