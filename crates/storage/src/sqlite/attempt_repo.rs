use assess_core::model::{AssessmentId, Attempt, AttemptId, StudentId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_attempt_row, to_json};
use crate::repository::{AttemptRecord, AttemptRepository, StorageError};

const SELECT_ATTEMPT: &str = r"
    SELECT
        id, assessment_id, student_id, status, started_at, submitted_at, graded_at,
        exercise_order, pointer, time_spent, answers, total_score, overall_feedback
    FROM attempts
";

// identity columns (assessment, student, started_at, order) never change
const UPDATE_ATTEMPT: &str = r"
    UPDATE attempts SET
        status = ?2,
        submitted_at = ?3,
        graded_at = ?4,
        pointer = ?5,
        time_spent = ?6,
        answers = ?7,
        total_score = ?8,
        overall_feedback = ?9
    WHERE id = ?1
";

/// Column values for one attempt, in insert order.
struct AttemptRow {
    id: String,
    assessment_id: i64,
    student_id: i64,
    status: &'static str,
    exercise_order: String,
    pointer: i64,
    time_spent: String,
    answers: String,
    total_score: Option<i64>,
    record: AttemptRecord,
}

impl AttemptRow {
    fn encode(attempt: &Attempt) -> Result<Self, StorageError> {
        let record = AttemptRecord::from_attempt(attempt);
        Ok(Self {
            id: record.id.to_string(),
            assessment_id: id_i64("assessment_id", record.assessment_id.value())?,
            student_id: id_i64("student_id", record.student_id.value())?,
            status: record.status.as_str(),
            exercise_order: to_json(&record.exercise_order)?,
            pointer: i64::try_from(record.pointer)
                .map_err(|_| StorageError::Serialization("pointer overflow".into()))?,
            time_spent: to_json(&record.time_spent)?,
            answers: to_json(&record.answers)?,
            total_score: record.total_score.map(i64::from),
            record,
        })
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn create_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let row = AttemptRow::encode(attempt)?;
        sqlx::query(
            r"
            INSERT INTO attempts (
                id, assessment_id, student_id, status, started_at, submitted_at, graded_at,
                exercise_order, pointer, time_spent, answers, total_score, overall_feedback
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(row.id)
        .bind(row.assessment_id)
        .bind(row.student_id)
        .bind(row.status)
        .bind(row.record.started_at)
        .bind(row.record.submitted_at)
        .bind(row.record.graded_at)
        .bind(row.exercise_order)
        .bind(row.pointer)
        .bind(row.time_spent)
        .bind(row.answers)
        .bind(row.total_score)
        .bind(row.record.overall_feedback)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let res = self.update_attempt(attempt, UPDATE_ATTEMPT).await?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn submit_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let sql = format!("{UPDATE_ATTEMPT} AND status = 'in_progress'");
        let res = self.update_attempt(attempt, &sql).await?;
        if res.rows_affected() > 0 {
            return Ok(());
        }
        let exists = sqlx::query("SELECT 1 FROM attempts WHERE id = ?1")
            .bind(attempt.id().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Err(if exists.is_some() {
            StorageError::Conflict
        } else {
            StorageError::NotFound
        })
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let sql = format!("{SELECT_ATTEMPT} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn find_open_attempt(
        &self,
        assessment_id: AssessmentId,
        student_id: StudentId,
    ) -> Result<Option<Attempt>, StorageError> {
        let sql = format!(
            "{SELECT_ATTEMPT} WHERE assessment_id = ?1 AND student_id = ?2 AND status = 'in_progress'"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("assessment_id", assessment_id.value())?)
            .bind(id_i64("student_id", student_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn list_attempts(&self, assessment_id: AssessmentId) -> Result<Vec<Attempt>, StorageError> {
        let sql = format!("{SELECT_ATTEMPT} WHERE assessment_id = ?1 ORDER BY started_at ASC, id ASC");
        let rows = sqlx::query(&sql)
            .bind(id_i64("assessment_id", assessment_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in rows {
            attempts.push(map_attempt_row(&row)?);
        }
        Ok(attempts)
    }
}

impl SqliteRepository {
    async fn update_attempt(
        &self,
        attempt: &Attempt,
        sql: &str,
    ) -> Result<sqlx::sqlite::SqliteQueryResult, StorageError> {
        let row = AttemptRow::encode(attempt)?;
        sqlx::query(sql)
            .bind(row.id)
            .bind(row.status)
            .bind(row.record.submitted_at)
            .bind(row.record.graded_at)
            .bind(row.pointer)
            .bind(row.time_spent)
            .bind(row.answers)
            .bind(row.total_score)
            .bind(row.record.overall_feedback)
            .execute(&self.pool)
            .await
            .map_err(db_err)
    }
}
