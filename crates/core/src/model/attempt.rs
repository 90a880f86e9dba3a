use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::AutoGrade;
use crate::model::answer::{Answer, GradeSource};
use crate::model::assessment::Assessment;
use crate::model::draft::Draft;
use crate::model::ids::{AssessmentId, AttemptId, ExerciseId, StudentId};
use crate::model::timer::{Direction, QuestionTimer, TimerError};
use crate::score::ScoreSummary;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt is {0}, expected in_progress")]
    NotInProgress(AttemptStatus),

    #[error("attempt is {0}, expected submitted")]
    NotSubmitted(AttemptStatus),

    #[error("attempt is already graded")]
    AlreadyGraded,

    #[error("exercise {0} is not part of this attempt")]
    UnknownExercise(ExerciseId),

    #[error("grading incomplete: {} exercise(s) unresolved", unresolved.len())]
    IncompleteGrading { unresolved: Vec<ExerciseId> },

    #[error("draft belongs to another attempt")]
    DraftMismatch,

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error("invalid persisted attempt: {0}")]
    InvalidPersistedState(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "submitted" => Some(Self::Submitted),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One student's pass through an assessment.
///
/// Lifecycle: `InProgress` (student edits the buffer) → `Submitted` (buffer
/// frozen, grading may run) → `Graded` (score locked).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    id: AttemptId,
    assessment_id: AssessmentId,
    student_id: StudentId,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    graded_at: Option<DateTime<Utc>>,
    answers: BTreeMap<ExerciseId, Answer>,
    timer: QuestionTimer,
    total_score: Option<u8>,
    overall_feedback: Option<String>,
}

impl Attempt {
    /// Open a fresh attempt over the assessment's exercises.
    #[must_use]
    pub fn start(
        id: AttemptId,
        assessment: &Assessment,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            assessment_id: assessment.id(),
            student_id,
            status: AttemptStatus::InProgress,
            started_at: now,
            submitted_at: None,
            graded_at: None,
            answers: BTreeMap::new(),
            timer: QuestionTimer::new(assessment.exercise_ids().to_vec(), now),
            total_score: None,
            overall_feedback: None,
        }
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidPersistedState` if the parts contradict
    /// each other (answers for unknown exercises, a score without full grading,
    /// missing timestamps for the status).
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AttemptId,
        assessment_id: AssessmentId,
        student_id: StudentId,
        status: AttemptStatus,
        started_at: DateTime<Utc>,
        submitted_at: Option<DateTime<Utc>>,
        graded_at: Option<DateTime<Utc>>,
        answers: BTreeMap<ExerciseId, Answer>,
        timer: QuestionTimer,
        total_score: Option<u8>,
        overall_feedback: Option<String>,
    ) -> Result<Self, AttemptError> {
        if let Some(unknown) = answers.keys().find(|id| !timer.contains(**id)) {
            return Err(AttemptError::InvalidPersistedState(format!(
                "answer for exercise {unknown} outside the attempt"
            )));
        }
        if status.is_terminal() && submitted_at.is_none() {
            return Err(AttemptError::InvalidPersistedState(
                "missing submitted_at".into(),
            ));
        }
        if status == AttemptStatus::Graded && (graded_at.is_none() || total_score.is_none()) {
            return Err(AttemptError::InvalidPersistedState(
                "graded attempt without score".into(),
            ));
        }
        if total_score.is_some_and(|s| s > 100) {
            return Err(AttemptError::InvalidPersistedState(
                "total score above 100".into(),
            ));
        }
        if total_score.is_some() && !answers.values().all(Answer::is_resolved) {
            return Err(AttemptError::InvalidPersistedState(
                "score present with unresolved answers".into(),
            ));
        }

        Ok(Self {
            id,
            assessment_id,
            student_id,
            status,
            started_at,
            submitted_at,
            graded_at,
            answers,
            timer,
            total_score,
            overall_feedback,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    #[must_use]
    pub fn graded_at(&self) -> Option<DateTime<Utc>> {
        self.graded_at
    }

    #[must_use]
    pub fn exercise_ids(&self) -> &[ExerciseId] {
        self.timer.order()
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<ExerciseId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, exercise_id: ExerciseId) -> Option<&Answer> {
        self.answers.get(&exercise_id)
    }

    #[must_use]
    pub fn timer(&self) -> &QuestionTimer {
        &self.timer
    }

    #[must_use]
    pub fn time_spent(&self) -> &BTreeMap<ExerciseId, u64> {
        self.timer.time_spent()
    }

    #[must_use]
    pub fn pointer(&self) -> usize {
        self.timer.pointer()
    }

    #[must_use]
    pub fn total_score(&self) -> Option<u8> {
        self.total_score
    }

    #[must_use]
    pub fn overall_feedback(&self) -> Option<&str> {
        self.overall_feedback.as_deref()
    }

    /// Exercises with a non-blank response.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_answered()).count()
    }

    /// Exercises whose points are resolved.
    #[must_use]
    pub fn graded_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_resolved()).count()
    }

    /// Exercises in attempt order that still lack points.
    #[must_use]
    pub fn unresolved(&self) -> Vec<ExerciseId> {
        self.exercise_ids()
            .iter()
            .copied()
            .filter(|id| !self.answers.get(id).is_some_and(Answer::is_resolved))
            .collect()
    }

    //
    // ─── STUDENT SIDE ──────────────────────────────────────────────────────────
    //

    /// Store (or replace) the response for one exercise. Never grades.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` once submitted and
    /// `AttemptError::UnknownExercise` for exercises outside the attempt.
    pub fn record_answer(&mut self, exercise_id: ExerciseId, response: Value) -> Result<(), AttemptError> {
        self.ensure_in_progress()?;
        if !self.timer.contains(exercise_id) {
            return Err(AttemptError::UnknownExercise(exercise_id));
        }
        self.answers.insert(exercise_id, Answer::new(response));
        Ok(())
    }

    /// Move the question pointer; see [`QuestionTimer::advance`].
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` once submitted, or a timer error
    /// for an out-of-range jump.
    pub fn advance(&mut self, direction: Direction, now: DateTime<Utc>) -> Result<usize, AttemptError> {
        self.ensure_in_progress()?;
        Ok(self.timer.advance(direction, now)?)
    }

    /// Restart timing of the current question after a reload.
    pub fn resume_timer(&mut self, now: DateTime<Utc>) {
        if self.status == AttemptStatus::InProgress && !self.timer.is_running() {
            self.timer.resume(now);
        }
    }

    /// Capture the whole student buffer.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` once submitted.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<Draft, AttemptError> {
        self.ensure_in_progress()?;
        let answers = self
            .answers
            .iter()
            .map(|(id, answer)| (*id, answer.response().clone()))
            .collect();
        Ok(Draft::new(
            self.id,
            answers,
            self.timer.time_spent().clone(),
            self.timer.pointer(),
            now,
        ))
    }

    /// Re-apply a draft onto this attempt.
    ///
    /// Answers in the draft replace buffered ones; entries for exercises outside
    /// the attempt are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::DraftMismatch` for another attempt's draft,
    /// `AttemptError::NotInProgress` once submitted, or a timer error if the
    /// draft pointer is out of range.
    pub fn apply_draft(&mut self, draft: &Draft, now: DateTime<Utc>) -> Result<(), AttemptError> {
        if draft.attempt_id() != self.id {
            return Err(AttemptError::DraftMismatch);
        }
        self.ensure_in_progress()?;
        self.timer.restore(draft.pointer(), draft.time_spent(), now)?;
        for (exercise_id, response) in draft.answers() {
            if self.timer.contains(*exercise_id) {
                self.answers
                    .insert(*exercise_id, Answer::new(response.clone()));
            }
        }
        Ok(())
    }

    /// Freeze the buffer.
    ///
    /// Every exercise gets an entry (blank ones as unanswered) so grading sees
    /// the full set. Returns `false` if the attempt was already submitted.
    pub fn submit(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != AttemptStatus::InProgress {
            return false;
        }
        self.timer.stop(now);
        for exercise_id in self.timer.order() {
            self.answers
                .entry(*exercise_id)
                .or_insert_with(Answer::unanswered);
        }
        self.status = AttemptStatus::Submitted;
        self.submitted_at = Some(now);
        true
    }

    //
    // ─── GRADING SIDE ──────────────────────────────────────────────────────────
    //

    /// Apply a catalog grade. Manual overrides are kept; returns whether the
    /// answer changed hands.
    ///
    /// Allowed on submitted attempts and, for re-grading, on graded ones.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotSubmitted` while in progress or
    /// `AttemptError::UnknownExercise` for exercises outside the attempt.
    pub fn apply_auto_grade(
        &mut self,
        exercise_id: ExerciseId,
        grade: AutoGrade,
        max_points: u32,
    ) -> Result<bool, AttemptError> {
        if self.status == AttemptStatus::InProgress {
            return Err(AttemptError::NotSubmitted(self.status));
        }
        let answer = self
            .answers
            .get_mut(&exercise_id)
            .ok_or(AttemptError::UnknownExercise(exercise_id))?;
        if answer.graded_by() == Some(GradeSource::Manual) {
            return Ok(false);
        }
        answer.apply_auto(grade, max_points);
        Ok(true)
    }

    /// Set grader-awarded points (clamped to `[0, max_points]`).
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyGraded` after finalization,
    /// `AttemptError::NotSubmitted` while in progress, or
    /// `AttemptError::UnknownExercise`.
    pub fn apply_manual_grade(
        &mut self,
        exercise_id: ExerciseId,
        points: i64,
        max_points: u32,
        feedback: Option<String>,
    ) -> Result<u32, AttemptError> {
        match self.status {
            AttemptStatus::InProgress => return Err(AttemptError::NotSubmitted(self.status)),
            AttemptStatus::Graded => return Err(AttemptError::AlreadyGraded),
            AttemptStatus::Submitted => {}
        }
        let answer = self
            .answers
            .get_mut(&exercise_id)
            .ok_or(AttemptError::UnknownExercise(exercise_id))?;
        Ok(answer.apply_manual(points, max_points, feedback))
    }

    /// Recompute the aggregate from current answers.
    ///
    /// `max_points` maps every exercise of the attempt to its maximum. The
    /// stored total is set only when everything is resolved.
    pub fn rescore(&mut self, max_points: &BTreeMap<ExerciseId, u32>) -> ScoreSummary {
        let summary = self.score_summary(max_points);
        self.total_score = summary.total_score;
        summary
    }

    #[must_use]
    pub fn score_summary(&self, max_points: &BTreeMap<ExerciseId, u32>) -> ScoreSummary {
        ScoreSummary::from_entries(self.exercise_ids().iter().map(|id| {
            (
                *id,
                max_points.get(id).copied().unwrap_or(0),
                self.answers.get(id).and_then(Answer::points_awarded),
            )
        }))
    }

    /// Lock in the score.
    ///
    /// Idempotent: finalizing a graded attempt returns its existing score.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::IncompleteGrading` listing unresolved exercises,
    /// or `AttemptError::NotSubmitted` while in progress.
    pub fn finalize(
        &mut self,
        max_points: &BTreeMap<ExerciseId, u32>,
        overall_feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<u8, AttemptError> {
        match self.status {
            AttemptStatus::InProgress => return Err(AttemptError::NotSubmitted(self.status)),
            AttemptStatus::Graded => {
                return self.total_score.ok_or_else(|| {
                    AttemptError::InvalidPersistedState("graded attempt without score".into())
                });
            }
            AttemptStatus::Submitted => {}
        }

        let summary = self.rescore(max_points);
        let Some(total) = summary.total_score else {
            return Err(AttemptError::IncompleteGrading {
                unresolved: summary.unresolved,
            });
        };

        self.status = AttemptStatus::Graded;
        self.graded_at = Some(now);
        self.overall_feedback = overall_feedback;
        Ok(total)
    }

    fn ensure_in_progress(&self) -> Result<(), AttemptError> {
        if self.status == AttemptStatus::InProgress {
            Ok(())
        } else {
            Err(AttemptError::NotInProgress(self.status))
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;
    use serde_json::json;

    fn assessment() -> Assessment {
        Assessment::new(
            AssessmentId::new(7),
            "Geography",
            vec![ExerciseId::new(1), ExerciseId::new(2)],
            None,
            None,
        )
        .unwrap()
    }

    fn max_points() -> BTreeMap<ExerciseId, u32> {
        BTreeMap::from([(ExerciseId::new(1), 10), (ExerciseId::new(2), 20)])
    }

    fn started() -> Attempt {
        Attempt::start(AttemptId::generate(), &assessment(), StudentId::new(3), fixed_now())
    }

    #[test]
    fn answers_only_for_known_exercises() {
        let mut attempt = started();
        attempt.record_answer(ExerciseId::new(1), json!(2)).unwrap();
        assert_eq!(
            attempt.record_answer(ExerciseId::new(9), json!(2)).unwrap_err(),
            AttemptError::UnknownExercise(ExerciseId::new(9))
        );
        assert_eq!(attempt.answered_count(), 1);
    }

    #[test]
    fn submit_freezes_buffer_and_is_idempotent() {
        let mut attempt = started();
        attempt.record_answer(ExerciseId::new(1), json!(2)).unwrap();

        let later = fixed_now() + Duration::seconds(45);
        assert!(attempt.submit(later));
        let once = attempt.clone();
        assert!(!attempt.submit(later + Duration::seconds(5)));
        assert_eq!(attempt, once);

        assert_eq!(attempt.status(), AttemptStatus::Submitted);
        assert_eq!(attempt.answers().len(), 2);
        assert!(!attempt.answer(ExerciseId::new(2)).unwrap().is_answered());
        assert_eq!(attempt.timer().seconds_on(ExerciseId::new(1)), 45);
        assert!(matches!(
            attempt.record_answer(ExerciseId::new(2), json!("late")),
            Err(AttemptError::NotInProgress(AttemptStatus::Submitted))
        ));
    }

    #[test]
    fn snapshot_then_apply_reproduces_buffer() {
        let mut attempt = started();
        attempt.record_answer(ExerciseId::new(1), json!(2)).unwrap();
        attempt
            .advance(Direction::Next, fixed_now() + Duration::seconds(20))
            .unwrap();
        attempt.record_answer(ExerciseId::new(2), json!("draft")).unwrap();

        let draft = attempt.snapshot(fixed_now()).unwrap();

        let mut reloaded = Attempt::from_persisted(
            attempt.id(),
            attempt.assessment_id(),
            attempt.student_id(),
            AttemptStatus::InProgress,
            attempt.started_at(),
            None,
            None,
            BTreeMap::new(),
            QuestionTimer::from_persisted(attempt.exercise_ids().to_vec(), 0, BTreeMap::new())
                .unwrap(),
            None,
            None,
        )
        .unwrap();
        reloaded.apply_draft(&draft, fixed_now()).unwrap();

        assert_eq!(reloaded.answers(), attempt.answers());
        assert_eq!(reloaded.time_spent(), attempt.time_spent());
        assert_eq!(reloaded.pointer(), attempt.pointer());
    }

    #[test]
    fn foreign_draft_is_refused() {
        let mut attempt = started();
        let other = started().snapshot(fixed_now()).unwrap();
        assert_eq!(
            attempt.apply_draft(&other, fixed_now()).unwrap_err(),
            AttemptError::DraftMismatch
        );
    }

    #[test]
    fn finalize_requires_every_answer_resolved() {
        let mut attempt = started();
        attempt.submit(fixed_now());
        attempt
            .apply_auto_grade(
                ExerciseId::new(1),
                AutoGrade {
                    is_correct: true,
                    points: 10,
                },
                10,
            )
            .unwrap();

        let err = attempt.finalize(&max_points(), None, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            AttemptError::IncompleteGrading {
                unresolved: vec![ExerciseId::new(2)]
            }
        );
        assert_eq!(attempt.status(), AttemptStatus::Submitted);

        attempt
            .apply_manual_grade(ExerciseId::new(2), 10, 20, Some("ok".into()))
            .unwrap();
        let total = attempt
            .finalize(&max_points(), Some("well done".into()), fixed_now())
            .unwrap();
        assert_eq!(total, 67);
        assert_eq!(attempt.status(), AttemptStatus::Graded);
        assert_eq!(attempt.total_score(), Some(67));

        // retry is a no-op returning the same score
        assert_eq!(attempt.finalize(&max_points(), None, fixed_now()).unwrap(), 67);
        assert_eq!(attempt.overall_feedback(), Some("well done"));
    }

    #[test]
    fn auto_grade_keeps_manual_override() {
        let mut attempt = started();
        attempt.submit(fixed_now());
        attempt
            .apply_manual_grade(ExerciseId::new(1), 4, 10, None)
            .unwrap();
        let changed = attempt
            .apply_auto_grade(
                ExerciseId::new(1),
                AutoGrade {
                    is_correct: true,
                    points: 10,
                },
                10,
            )
            .unwrap();
        assert!(!changed);
        let answer = attempt.answer(ExerciseId::new(1)).unwrap();
        assert_eq!(answer.points_awarded(), Some(4));
        assert_eq!(answer.graded_by(), Some(GradeSource::Manual));
    }

    #[test]
    fn manual_grade_rejected_after_finalize() {
        let mut attempt = started();
        attempt.submit(fixed_now());
        attempt.apply_manual_grade(ExerciseId::new(1), 10, 10, None).unwrap();
        attempt.apply_manual_grade(ExerciseId::new(2), 20, 20, None).unwrap();
        attempt.finalize(&max_points(), None, fixed_now()).unwrap();
        assert_eq!(
            attempt
                .apply_manual_grade(ExerciseId::new(1), 0, 10, None)
                .unwrap_err(),
            AttemptError::AlreadyGraded
        );
    }

    #[test]
    fn persisted_score_without_grading_is_rejected() {
        let attempt = started();
        let err = Attempt::from_persisted(
            attempt.id(),
            attempt.assessment_id(),
            attempt.student_id(),
            AttemptStatus::Graded,
            attempt.started_at(),
            Some(fixed_now()),
            Some(fixed_now()),
            BTreeMap::from([(ExerciseId::new(1), Answer::new(json!(1)))]),
            attempt.timer().clone(),
            Some(50),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::InvalidPersistedState(_)));
    }
}
