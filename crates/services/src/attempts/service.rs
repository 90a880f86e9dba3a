use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use assess_core::model::{
    AssessmentId, Attempt, AttemptError, AttemptId, AttemptStatus, Direction, Draft, Exercise,
    ExerciseId, StudentId,
};
use assess_core::score::ScoreSummary;
use assess_core::time::Clock;
use assess_core::ExerciseCatalog;
use serde_json::Value;
use storage::repository::{
    AssessmentRepository, AttemptRepository, DraftStore, ExerciseRepository, StorageError,
};
use tracing::{debug, info, warn};

use super::view::QuestionSlot;
use crate::error::SessionError;
use crate::grading::GradingService;
use crate::locks::AttemptLocks;
use crate::progress::AttemptProgress;

/// Returned by [`AttemptSessionService::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedAttempt {
    pub attempt_id: AttemptId,
    /// `true` when an unsubmitted attempt already existed for the pair.
    pub resumed: bool,
}

/// Returned by [`AttemptSessionService::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub attempt_id: AttemptId,
    /// `false` when the attempt had already been submitted.
    pub newly_submitted: bool,
    pub summary: ScoreSummary,
}

struct LiveAttempt {
    attempt: Attempt,
    exercises: Vec<Exercise>,
    time_limit_secs: Option<u32>,
}

type LiveHandle = Arc<tokio::sync::Mutex<LiveAttempt>>;

/// Owns students' in-progress answer buffers.
///
/// Each open attempt lives behind its own async mutex, which makes the
/// session manager the single writer for that attempt. Draft snapshots and
/// submission take the same lock, so a snapshot can never land after the
/// submission that froze the buffer.
///
/// Loading an attempt into the cache and dropping it from the cache (on
/// submit or leave) are serialized per attempt, so a reload can never cache
/// a copy that a concurrent submission already replaced.
pub struct AttemptSessionService {
    clock: Clock,
    catalog: ExerciseCatalog,
    exercises: Arc<dyn ExerciseRepository>,
    assessments: Arc<dyn AssessmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
    drafts: Arc<dyn DraftStore>,
    grading: Arc<GradingService>,
    live: Mutex<HashMap<AttemptId, LiveHandle>>,
    loading: AttemptLocks,
}

impl AttemptSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exercises: Arc<dyn ExerciseRepository>,
        assessments: Arc<dyn AssessmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
        drafts: Arc<dyn DraftStore>,
        grading: Arc<GradingService>,
    ) -> Self {
        Self {
            clock,
            catalog: ExerciseCatalog::new(),
            exercises,
            assessments,
            attempts,
            drafts,
            grading,
            live: Mutex::new(HashMap::new()),
            loading: AttemptLocks::default(),
        }
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Open an attempt, resuming the student's unsubmitted one if it exists.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the assessment or any of its
    /// exercises is missing, or the attempt cannot be stored.
    pub async fn start(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
    ) -> Result<StartedAttempt, SessionError> {
        let assessment = self.assessments.get_assessment(assessment_id).await?;

        if let Some(open) = self.attempts.find_open_attempt(assessment_id, student_id).await? {
            return self.resume(open.id()).await;
        }

        let exercises = self.exercises.get_exercises(assessment.exercise_ids()).await?;
        let attempt = Attempt::start(AttemptId::generate(), &assessment, student_id, self.clock.now());
        match self.attempts.create_attempt(&attempt).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                // a concurrent start for the same pair won
                let open = self
                    .attempts
                    .find_open_attempt(assessment_id, student_id)
                    .await?
                    .ok_or(StorageError::Conflict)?;
                return self.resume(open.id()).await;
            }
            Err(e) => return Err(e.into()),
        }

        let attempt_id = attempt.id();
        self.cache(LiveAttempt {
            attempt,
            exercises,
            time_limit_secs: assessment.time_limit_secs(),
        });
        info!(%attempt_id, %assessment_id, %student_id, "attempt started");
        Ok(StartedAttempt {
            attempt_id,
            resumed: false,
        })
    }

    /// Freeze the buffer, discard the draft, and hand off to grading.
    ///
    /// Submitting twice is the same as submitting once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the attempt cannot be persisted, or
    /// `SessionError::Grading` if auto-grading fails after a successful submit.
    pub async fn submit(&self, attempt_id: AttemptId) -> Result<SubmitOutcome, SessionError> {
        let loading = self.loading.acquire(attempt_id).await;
        let live = self.load(attempt_id).await?;
        let newly_submitted = {
            let mut guard = live.lock().await;
            let newly_submitted = if guard.attempt.status() == AttemptStatus::InProgress {
                let mut frozen = guard.attempt.clone();
                frozen.submit(self.clock.now());
                match self.attempts.submit_attempt(&frozen).await {
                    Ok(()) => {
                        guard.attempt = frozen;
                        info!(
                            %attempt_id,
                            answered = guard.attempt.answered_count(),
                            "attempt submitted"
                        );
                        true
                    }
                    Err(StorageError::Conflict) => {
                        // stored copy was closed elsewhere; it wins over this buffer
                        warn!(%attempt_id, "attempt already closed in storage");
                        guard.attempt = self.attempts.get_attempt(attempt_id).await?;
                        false
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                debug!(%attempt_id, status = %guard.attempt.status(), "attempt already submitted");
                false
            };
            self.drafts.delete_draft(attempt_id).await?;
            newly_submitted
        };
        self.forget(attempt_id);
        drop(loading);

        let summary = self.grading.auto_grade(attempt_id).await?;
        Ok(SubmitOutcome {
            attempt_id,
            newly_submitted,
            summary,
        })
    }

    //
    // ─── ANSWER BUFFER ─────────────────────────────────────────────────────────
    //

    /// Validate and buffer a response. Never grades.
    ///
    /// A JSON `null` clears the response without validation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidAnswer` if the catalog rejects the
    /// payload, or `SessionError::Attempt` once submitted or for exercises
    /// outside the attempt.
    pub async fn record_answer(
        &self,
        attempt_id: AttemptId,
        exercise_id: ExerciseId,
        answer: Value,
    ) -> Result<(), SessionError> {
        let live = self.live(attempt_id).await?;
        let mut guard = live.lock().await;
        let LiveAttempt {
            attempt, exercises, ..
        } = &mut *guard;

        if attempt.status() != AttemptStatus::InProgress {
            return Err(AttemptError::NotInProgress(attempt.status()).into());
        }
        let exercise = exercises
            .iter()
            .find(|e| e.id() == exercise_id)
            .ok_or(AttemptError::UnknownExercise(exercise_id))?;
        if !answer.is_null() {
            self.catalog
                .validate_answer(exercise.exercise_type(), exercise.content(), &answer)
                .map_err(|source| SessionError::InvalidAnswer {
                    exercise_id,
                    source,
                })?;
        }
        attempt.record_answer(exercise_id, answer)?;

        debug!(%attempt_id, %exercise_id, "answer recorded");
        Ok(())
    }

    /// Move to another question and save a draft for the one being left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Attempt` once submitted or for an out-of-range
    /// jump, or storage errors from the draft save.
    pub async fn advance(
        &self,
        attempt_id: AttemptId,
        direction: Direction,
    ) -> Result<QuestionSlot, SessionError> {
        let live = self.live(attempt_id).await?;
        let mut guard = live.lock().await;
        let before = guard.attempt.pointer();
        let after = guard.attempt.advance(direction, self.clock.now())?;
        if after != before {
            self.write_draft(&guard.attempt).await?;
        }
        self.slot(&guard)
    }

    /// The question under the pointer, with the solution stripped.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the attempt cannot be loaded.
    pub async fn current_question(&self, attempt_id: AttemptId) -> Result<QuestionSlot, SessionError> {
        let live = self.live(attempt_id).await?;
        let guard = live.lock().await;
        self.slot(&guard)
    }

    /// Answered and graded counts for the live buffer.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the attempt cannot be loaded.
    pub async fn progress(&self, attempt_id: AttemptId) -> Result<AttemptProgress, SessionError> {
        let live = self.live(attempt_id).await?;
        let guard = live.lock().await;
        Ok(AttemptProgress::of(&guard.attempt))
    }

    //
    // ─── DRAFTS ────────────────────────────────────────────────────────────────
    //

    /// Write the whole buffer to the draft store, replacing any older draft.
    ///
    /// Returns `Ok(None)` without touching the store once the attempt is no
    /// longer in progress, so a late autosave cannot resurrect a draft.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the attempt cannot be loaded or the draft
    /// cannot be written.
    pub async fn snapshot_draft(&self, attempt_id: AttemptId) -> Result<Option<Draft>, SessionError> {
        let live = self.live(attempt_id).await?;
        let guard = live.lock().await;
        self.write_draft(&guard.attempt).await
    }

    /// Save a draft and release the live buffer, e.g. when the student navigates away.
    ///
    /// # Errors
    ///
    /// Same as [`AttemptSessionService::snapshot_draft`].
    pub async fn leave(&self, attempt_id: AttemptId) -> Result<Option<Draft>, SessionError> {
        let _loading = self.loading.acquire(attempt_id).await;
        let live = self.load(attempt_id).await?;
        let draft = {
            let guard = live.lock().await;
            self.write_draft(&guard.attempt).await?
        };
        self.forget(attempt_id);
        Ok(draft)
    }

    /// Re-apply the stored draft onto the live buffer.
    ///
    /// A missing, unreadable, or mismatched draft yields `Ok(None)`; unusable
    /// drafts are removed. Restored answers the catalog rejects are dropped.
    /// Attempts reloaded from storage already carry their draft.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the attempt or the draft store cannot be read.
    pub async fn restore_draft(&self, attempt_id: AttemptId) -> Result<Option<Draft>, SessionError> {
        let live = self.live(attempt_id).await?;
        let mut guard = live.lock().await;
        if guard.attempt.status() != AttemptStatus::InProgress {
            return Ok(None);
        }
        self.apply_stored_draft(&mut guard).await
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    async fn write_draft(&self, attempt: &Attempt) -> Result<Option<Draft>, SessionError> {
        if attempt.status() != AttemptStatus::InProgress {
            warn!(attempt_id = %attempt.id(), status = %attempt.status(), "stale draft save ignored");
            return Ok(None);
        }
        let draft = attempt.snapshot(self.clock.now())?;
        let bytes = draft.encode()?;
        self.drafts.save_draft(attempt.id(), &bytes).await?;
        debug!(attempt_id = %attempt.id(), bytes = bytes.len(), "draft saved");
        Ok(Some(draft))
    }

    fn slot(&self, live: &LiveAttempt) -> Result<QuestionSlot, SessionError> {
        let attempt = &live.attempt;
        let index = attempt.pointer();
        let exercise = live.exercises.get(index).ok_or(StorageError::NotFound)?;
        let elapsed = self
            .clock
            .now()
            .signed_duration_since(attempt.started_at())
            .num_seconds();
        let elapsed = u64::try_from(elapsed).unwrap_or(0);

        Ok(QuestionSlot {
            attempt_id: attempt.id(),
            index,
            total: live.exercises.len(),
            question: exercise.question_view(),
            answer: attempt
                .answer(exercise.id())
                .and_then(|a| a.response_opt())
                .cloned(),
            time_remaining_secs: live
                .time_limit_secs
                .map(|limit| u64::from(limit).saturating_sub(elapsed)),
        })
    }

    /// Decode, vet, and apply the stored draft.
    async fn apply_stored_draft(&self, live: &mut LiveAttempt) -> Result<Option<Draft>, SessionError> {
        let attempt_id = live.attempt.id();
        let Some(bytes) = self.drafts.load_draft(attempt_id).await? else {
            return Ok(None);
        };

        let restored = Draft::decode(&bytes, attempt_id)
            .map_err(|e| e.to_string())
            .and_then(|mut draft| {
                let dropped = draft.retain_answers(|exercise_id, response| {
                    self.accepts(&live.exercises, exercise_id, response)
                });
                if !dropped.is_empty() {
                    warn!(%attempt_id, ?dropped, "dropping invalid draft answers");
                }
                live.attempt
                    .apply_draft(&draft, self.clock.now())
                    .map(|()| draft)
                    .map_err(|e| e.to_string())
            });
        match restored {
            Ok(draft) => {
                info!(%attempt_id, answers = draft.answers().len(), "draft restored");
                Ok(Some(draft))
            }
            Err(reason) => {
                warn!(%attempt_id, %reason, "discarding unusable draft");
                self.drafts.delete_draft(attempt_id).await?;
                Ok(None)
            }
        }
    }

    /// Whether `record_answer` would have buffered this response.
    fn accepts(&self, exercises: &[Exercise], exercise_id: ExerciseId, response: &Value) -> bool {
        let Some(exercise) = exercises.iter().find(|e| e.id() == exercise_id) else {
            return false;
        };
        response.is_null()
            || self
                .catalog
                .validate_answer(exercise.exercise_type(), exercise.content(), response)
                .is_ok()
    }

    async fn resume(&self, attempt_id: AttemptId) -> Result<StartedAttempt, SessionError> {
        self.live(attempt_id).await?;
        info!(%attempt_id, "attempt resumed");
        Ok(StartedAttempt {
            attempt_id,
            resumed: true,
        })
    }

    /// The live buffer for an attempt, loading it from storage if needed.
    async fn live(&self, attempt_id: AttemptId) -> Result<LiveHandle, SessionError> {
        if let Some(handle) = self.cached(attempt_id) {
            return Ok(handle);
        }
        let _loading = self.loading.acquire(attempt_id).await;
        self.load(attempt_id).await
    }

    /// Cache lookup, falling back to storage. Callers hold the loading lock.
    ///
    /// A reloaded in-progress attempt gets its stored draft applied before it
    /// is cached. Attempts that are no longer in progress are loaded but not
    /// cached.
    async fn load(&self, attempt_id: AttemptId) -> Result<LiveHandle, SessionError> {
        if let Some(handle) = self.cached(attempt_id) {
            return Ok(handle);
        }
        let mut attempt = self.attempts.get_attempt(attempt_id).await?;
        let assessment = self.assessments.get_assessment(attempt.assessment_id()).await?;
        let exercises = self.exercises.get_exercises(attempt.exercise_ids()).await?;
        attempt.resume_timer(self.clock.now());

        let mut live = LiveAttempt {
            attempt,
            exercises,
            time_limit_secs: assessment.time_limit_secs(),
        };
        if live.attempt.status() != AttemptStatus::InProgress {
            return Ok(Arc::new(tokio::sync::Mutex::new(live)));
        }
        self.apply_stored_draft(&mut live).await?;
        Ok(self.cache(live))
    }

    fn cached(&self, attempt_id: AttemptId) -> Option<LiveHandle> {
        let map = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&attempt_id).cloned()
    }

    /// Insert unless already cached; either way return the cached handle.
    fn cache(&self, live: LiveAttempt) -> LiveHandle {
        let mut map = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(live.attempt.id())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(live))),
        )
    }

    fn forget(&self, attempt_id: AttemptId) {
        let mut map = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(&attempt_id);
    }
}
