use async_trait::async_trait;
use assess_core::ExerciseCatalog;
use assess_core::model::{
    Answer, Assessment, AssessmentId, Attempt, AttemptError, AttemptId, AttemptStatus, Exercise,
    ExerciseDraft, ExerciseId, QuestionTimer, StudentId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape for an attempt.
///
/// Mirrors the domain `Attempt` field by field so adapters can store it
/// without reaching into private state. Timer position is kept, the running
/// instant is not.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub assessment_id: AssessmentId,
    pub student_id: StudentId,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub exercise_order: Vec<ExerciseId>,
    pub pointer: usize,
    pub time_spent: BTreeMap<ExerciseId, u64>,
    pub answers: BTreeMap<ExerciseId, Answer>,
    pub total_score: Option<u8>,
    pub overall_feedback: Option<String>,
}

impl AttemptRecord {
    #[must_use]
    pub fn from_attempt(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id(),
            assessment_id: attempt.assessment_id(),
            student_id: attempt.student_id(),
            status: attempt.status(),
            started_at: attempt.started_at(),
            submitted_at: attempt.submitted_at(),
            graded_at: attempt.graded_at(),
            exercise_order: attempt.exercise_ids().to_vec(),
            pointer: attempt.pointer(),
            time_spent: attempt.time_spent().clone(),
            answers: attempt.answers().clone(),
            total_score: attempt.total_score(),
            overall_feedback: attempt.overall_feedback().map(str::to_owned),
        }
    }

    /// Convert the record back into a domain `Attempt`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the pointer is out of range or the parts
    /// contradict each other.
    pub fn into_attempt(self) -> Result<Attempt, AttemptError> {
        let timer = QuestionTimer::from_persisted(self.exercise_order, self.pointer, self.time_spent)?;
        Attempt::from_persisted(
            self.id,
            self.assessment_id,
            self.student_id,
            self.status,
            self.started_at,
            self.submitted_at,
            self.graded_at,
            self.answers,
            timer,
            self.total_score,
            self.overall_feedback,
        )
    }
}

/// Rebuild a stored exercise through the catalog so corrupt rows surface early.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the stored payloads no longer
/// validate.
pub fn exercise_from_draft(draft: ExerciseDraft) -> Result<Exercise, StorageError> {
    draft
        .validate(&ExerciseCatalog::new())
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for authored exercises.
#[async_trait]
pub trait ExerciseRepository: Send + Sync {
    /// Persist or replace an exercise.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the exercise cannot be stored.
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError>;

    /// Fetch one exercise.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError>;

    /// Fetch exercises in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any are missing, or other storage errors.
    async fn get_exercises(&self, ids: &[ExerciseId]) -> Result<Vec<Exercise>, StorageError>;
}

#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Persist or replace an assessment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assessment cannot be stored.
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError>;

    /// Fetch an assessment by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment, StorageError>;
}

/// Repository contract for attempts.
///
/// At most one `in_progress` attempt may exist per (assessment, student);
/// adapters enforce it and report violations as `StorageError::Conflict`.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Insert a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the ID is taken or the student
    /// already has an open attempt on the assessment.
    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// Overwrite an existing attempt with its current state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt was never created.
    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// Store a submitted attempt, but only over a row that is still `in_progress`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored attempt was already
    /// submitted or graded, or `StorageError::NotFound` if it was never created.
    async fn submit_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// Fetch an attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError>;

    /// The student's `in_progress` attempt on the assessment, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn find_open_attempt(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
    ) -> Result<Option<Attempt>, StorageError>;

    /// Every attempt on an assessment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_attempts(&self, assessment_id: AssessmentId) -> Result<Vec<Attempt>, StorageError>;
}

/// Opaque key-value store for attempt drafts.
///
/// Values are encoded blobs; decoding and validation live in the domain layer.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Replace the draft stored for an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be written.
    async fn save_draft(&self, attempt_id: AttemptId, payload: &[u8]) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn load_draft(&self, attempt_id: AttemptId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove the draft; removing a missing draft is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    exercises: Arc<Mutex<HashMap<ExerciseId, Exercise>>>,
    assessments: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
    drafts: Arc<Mutex<HashMap<AttemptId, Vec<u8>>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExerciseRepository for InMemoryRepository {
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError> {
        let mut guard = self
            .exercises
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(exercise.id(), exercise.clone());
        Ok(())
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError> {
        let guard = self
            .exercises
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_exercises(&self, ids: &[ExerciseId]) -> Result<Vec<Exercise>, StorageError> {
        let guard = self
            .exercises
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match guard.get(id) {
                Some(exercise) => found.push(exercise.clone()),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let mut guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(assessment.id(), assessment.clone());
        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment, StorageError> {
        let guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let clashes = guard.iter().any(|existing| {
            existing.id() == attempt.id()
                || (attempt.status() == AttemptStatus::InProgress
                    && existing.status() == AttemptStatus::InProgress
                    && existing.assessment_id() == attempt.assessment_id()
                    && existing.student_id() == attempt.student_id())
        });
        if clashes {
            return Err(StorageError::Conflict);
        }
        guard.push(attempt.clone());
        Ok(())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id() == attempt.id())
            .ok_or(StorageError::NotFound)?;
        *slot = attempt.clone();
        Ok(())
    }

    async fn submit_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id() == attempt.id())
            .ok_or(StorageError::NotFound)?;
        if slot.status() != AttemptStatus::InProgress {
            return Err(StorageError::Conflict);
        }
        *slot = attempt.clone();
        Ok(())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn find_open_attempt(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
    ) -> Result<Option<Attempt>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .find(|a| {
                a.status() == AttemptStatus::InProgress
                    && a.assessment_id() == assessment_id
                    && a.student_id() == student_id
            })
            .cloned())
    }

    async fn list_attempts(&self, assessment_id: AssessmentId) -> Result<Vec<Attempt>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|a| a.assessment_id() == assessment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DraftStore for InMemoryRepository {
    async fn save_draft(&self, attempt_id: AttemptId, payload: &[u8]) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(attempt_id, payload.to_vec());
        Ok(())
    }

    async fn load_draft(&self, attempt_id: AttemptId) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&attempt_id).cloned())
    }

    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&attempt_id);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exercises: Arc<dyn ExerciseRepository>,
    pub assessments: Arc<dyn AssessmentRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub drafts: Arc<dyn DraftStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            exercises: Arc::new(repo.clone()),
            assessments: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            drafts: Arc::new(repo),
        }
    }
}
