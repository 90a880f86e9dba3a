use std::sync::Arc;
use std::time::Duration;

use assess_core::model::AttemptId;
use storage::repository::Storage;
use tracing::info;

use crate::attempts::{AttemptSessionService, AutosaveHandle, Autosaver};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::exercise_service::ExerciseService;
use crate::grading::{BroadcastGradingEvents, GradingEvents, GradingService};
use crate::progress::ProgressService;
use crate::Clock;

/// Every service wired over one `Storage`.
#[derive(Clone)]
pub struct Engine {
    autosave_interval: Duration,
    events: Arc<BroadcastGradingEvents>,
    exercises: Arc<ExerciseService>,
    sessions: Arc<AttemptSessionService>,
    grading: Arc<GradingService>,
    progress: Arc<ProgressService>,
}

impl Engine {
    /// Build services over the given storage with the default autosave interval.
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock) -> Self {
        Self::with_autosave_interval(storage, clock, EngineConfig::default().autosave_interval())
    }

    #[must_use]
    pub fn with_autosave_interval(storage: &Storage, clock: Clock, autosave_interval: Duration) -> Self {
        let events = Arc::new(BroadcastGradingEvents::default());
        let sink: Arc<dyn GradingEvents> = Arc::clone(&events) as Arc<dyn GradingEvents>;
        let grading = Arc::new(GradingService::new(
            clock.clone(),
            Arc::clone(&storage.exercises),
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.attempts),
            sink,
        ));
        let sessions = Arc::new(AttemptSessionService::new(
            clock,
            Arc::clone(&storage.exercises),
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.drafts),
            Arc::clone(&grading),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.attempts),
        ));
        let exercises = Arc::new(ExerciseService::new(
            Arc::clone(&storage.exercises),
            Arc::clone(&storage.assessments),
        ));

        Self {
            autosave_interval,
            events,
            exercises,
            sessions,
            grading,
            progress,
        }
    }

    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Sqlite` if the database cannot be opened or migrated.
    pub async fn sqlite(config: &EngineConfig, clock: Clock) -> Result<Self, EngineError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        info!(database_url = %config.database_url, "storage ready");
        Ok(Self::with_autosave_interval(
            &storage,
            clock,
            config.autosave_interval(),
        ))
    }

    /// Start periodic draft snapshots for an open attempt.
    #[must_use]
    pub fn autosave(&self, attempt_id: AttemptId) -> AutosaveHandle {
        Autosaver::spawn(Arc::clone(&self.sessions), attempt_id, self.autosave_interval)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<AttemptSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn grading(&self) -> Arc<GradingService> {
        Arc::clone(&self.grading)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn exercises(&self) -> Arc<ExerciseService> {
        Arc::clone(&self.exercises)
    }

    /// Finalization events for downstream consumers.
    #[must_use]
    pub fn events(&self) -> Arc<BroadcastGradingEvents> {
        Arc::clone(&self.events)
    }
}
