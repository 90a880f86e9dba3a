use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    AssessmentRepository, AttemptRepository, DraftStore, ExerciseRepository, Storage,
};

mod assessment_repo;
mod attempt_repo;
mod draft_repo;
mod exercise_repo;
mod mapping;
mod migrate;

/// One pool serving exercises, assessments, attempts, and drafts.
///
/// Clones share the pool, so every repository handed out by
/// [`Storage::sqlite`] sees the same attempt rows and draft blobs.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the assessment database at `database_url`.
    ///
    /// Connections run in WAL mode and wait up to five seconds on a locked
    /// database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or a
    /// connection PRAGMA fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Bring the catalog, attempt, and draft tables up to the current schema.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration step fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open and migrate the database, then expose it through every repository port.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let exercises: Arc<dyn ExerciseRepository> = Arc::new(repo.clone());
        let assessments: Arc<dyn AssessmentRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let drafts: Arc<dyn DraftStore> = Arc::new(repo);
        Ok(Self {
            exercises,
            assessments,
            attempts,
            drafts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::AttemptId;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[tokio::test]
    async fn storage_ports_share_one_database() {
        let storage = Storage::sqlite("sqlite:file:memdb_shared_ports?mode=memory&cache=shared")
            .await
            .unwrap();
        let id = AttemptId::generate();
        storage.drafts.save_draft(id, b"blob").await.unwrap();

        let again = Storage::sqlite("sqlite:file:memdb_shared_ports?mode=memory&cache=shared")
            .await
            .unwrap();
        assert_eq!(again.drafts.load_draft(id).await.unwrap(), Some(b"blob".to_vec()));
    }
}
