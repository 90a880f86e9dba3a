use std::str::FromStr;

use assess_core::model::{
    Assessment, AssessmentId, Attempt, AttemptId, AttemptStatus, Difficulty, Exercise,
    ExerciseDraft, ExerciseId, StudentId,
};
use assess_core::ExerciseType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::{AttemptRecord, StorageError, exercise_from_draft};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Unique-constraint violations become `Conflict`; everything else is a
/// connection problem.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
}

pub(crate) fn exercise_id_from_i64(v: i64) -> Result<ExerciseId, StorageError> {
    Ok(ExerciseId::new(i64_to_u64("exercise_id", v)?))
}

pub(crate) fn assessment_id_from_i64(v: i64) -> Result<AssessmentId, StorageError> {
    Ok(AssessmentId::new(i64_to_u64("assessment_id", v)?))
}

pub(crate) fn student_id_from_i64(v: i64) -> Result<StudentId, StorageError> {
    Ok(StudentId::new(i64_to_u64("student_id", v)?))
}

pub(crate) fn parse_attempt_status(s: &str) -> Result<AttemptStatus, StorageError> {
    AttemptStatus::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid status: {s}")))
}

pub(crate) fn map_exercise_row(row: &sqlx::sqlite::SqliteRow) -> Result<Exercise, StorageError> {
    let type_str: String = row.try_get("exercise_type").map_err(ser)?;
    let exercise_type = ExerciseType::from_str(&type_str).map_err(ser)?;
    let difficulty_str: String = row.try_get("difficulty").map_err(ser)?;
    let difficulty = Difficulty::parse(&difficulty_str).ok_or_else(|| {
        StorageError::Serialization(format!("invalid difficulty: {difficulty_str}"))
    })?;
    let points_i64: i64 = row.try_get("points").map_err(ser)?;
    let points = u32::try_from(points_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid points: {points_i64}")))?;

    let draft = ExerciseDraft {
        id: exercise_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        exercise_type,
        title: from_json("title", &row.try_get::<String, _>("title").map_err(ser)?)?,
        instructions: from_json(
            "instructions",
            &row.try_get::<String, _>("instructions").map_err(ser)?,
        )?,
        points,
        difficulty,
        content: from_json("content", &row.try_get::<String, _>("content").map_err(ser)?)?,
        solution: from_json("solution", &row.try_get::<String, _>("solution").map_err(ser)?)?,
    };
    exercise_from_draft(draft)
}

pub(crate) fn map_assessment_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Assessment, StorageError> {
    let time_limit_secs = row
        .try_get::<Option<i64>, _>("time_limit_secs")
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid time limit: {v}")))
        })
        .transpose()?;
    let passing_score = row
        .try_get::<Option<i64>, _>("passing_score")
        .map_err(ser)?
        .map(|v| {
            u8::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid passing score: {v}")))
        })
        .transpose()?;

    Assessment::new(
        assessment_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        from_json(
            "exercise_ids",
            &row.try_get::<String, _>("exercise_ids").map_err(ser)?,
        )?,
        time_limit_secs,
        passing_score,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let id_str: String = row.try_get("id").map_err(ser)?;
    let status_str: String = row.try_get("status").map_err(ser)?;
    let pointer_i64: i64 = row.try_get("pointer").map_err(ser)?;
    let total_score = row
        .try_get::<Option<i64>, _>("total_score")
        .map_err(ser)?
        .map(|v| {
            u8::try_from(v)
                .map_err(|_| StorageError::Serialization(format!("invalid total_score: {v}")))
        })
        .transpose()?;

    let record = AttemptRecord {
        id: AttemptId::from_str(&id_str).map_err(ser)?,
        assessment_id: assessment_id_from_i64(row.try_get::<i64, _>("assessment_id").map_err(ser)?)?,
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        status: parse_attempt_status(&status_str)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        graded_at: row.try_get("graded_at").map_err(ser)?,
        exercise_order: from_json(
            "exercise_order",
            &row.try_get::<String, _>("exercise_order").map_err(ser)?,
        )?,
        pointer: usize::try_from(pointer_i64)
            .map_err(|_| StorageError::Serialization(format!("invalid pointer: {pointer_i64}")))?,
        time_spent: from_json(
            "time_spent",
            &row.try_get::<String, _>("time_spent").map_err(ser)?,
        )?,
        answers: from_json("answers", &row.try_get::<String, _>("answers").map_err(ser)?)?,
        total_score,
        overall_feedback: row.try_get("overall_feedback").map_err(ser)?,
    };

    record.into_attempt().map_err(ser)
}
