use assess_core::model::{Assessment, AssessmentId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_assessment_row, to_json};
use crate::repository::{AssessmentRepository, StorageError};

#[async_trait::async_trait]
impl AssessmentRepository for SqliteRepository {
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO assessments (id, title, exercise_ids, time_limit_secs, passing_score)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                exercise_ids = excluded.exercise_ids,
                time_limit_secs = excluded.time_limit_secs,
                passing_score = excluded.passing_score
            ",
        )
        .bind(id_i64("assessment_id", assessment.id().value())?)
        .bind(assessment.title())
        .bind(to_json(assessment.exercise_ids())?)
        .bind(assessment.time_limit_secs().map(i64::from))
        .bind(assessment.passing_score().map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Assessment, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, exercise_ids, time_limit_secs, passing_score
            FROM assessments
            WHERE id = ?1
            ",
        )
        .bind(id_i64("assessment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound)?;

        map_assessment_row(&row)
    }
}
