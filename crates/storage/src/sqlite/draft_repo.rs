use assess_core::model::AttemptId;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, ser};
use crate::repository::{DraftStore, StorageError};

#[async_trait::async_trait]
impl DraftStore for SqliteRepository {
    async fn save_draft(&self, attempt_id: AttemptId, payload: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO attempt_drafts (attempt_id, payload, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(attempt_id) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
            ",
        )
        .bind(attempt_id.to_string())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn load_draft(&self, attempt_id: AttemptId) -> Result<Option<Vec<u8>>, StorageError> {
        let row = sqlx::query("SELECT payload FROM attempt_drafts WHERE attempt_id = ?1")
            .bind(attempt_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| r.try_get::<Vec<u8>, _>("payload").map_err(ser))
            .transpose()
    }

    async fn delete_draft(&self, attempt_id: AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_drafts WHERE attempt_id = ?1")
            .bind(attempt_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
