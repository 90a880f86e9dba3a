use std::collections::HashMap;

use assess_core::model::{Exercise, ExerciseId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_exercise_row, to_json};
use crate::repository::{ExerciseRepository, StorageError};

#[async_trait::async_trait]
impl ExerciseRepository for SqliteRepository {
    async fn upsert_exercise(&self, exercise: &Exercise) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO exercises (
                id, exercise_type, title, instructions, points, difficulty, content, solution
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                exercise_type = excluded.exercise_type,
                title = excluded.title,
                instructions = excluded.instructions,
                points = excluded.points,
                difficulty = excluded.difficulty,
                content = excluded.content,
                solution = excluded.solution
            ",
        )
        .bind(id_i64("exercise_id", exercise.id().value())?)
        .bind(exercise.exercise_type().as_str())
        .bind(to_json(exercise.title())?)
        .bind(to_json(exercise.instructions())?)
        .bind(i64::from(exercise.points()))
        .bind(exercise.difficulty().as_str())
        .bind(to_json(exercise.content())?)
        .bind(to_json(exercise.solution())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_exercise(&self, id: ExerciseId) -> Result<Exercise, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, exercise_type, title, instructions, points, difficulty, content, solution
            FROM exercises
            WHERE id = ?1
            ",
        )
        .bind(id_i64("exercise_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound)?;

        map_exercise_row(&row)
    }

    async fn get_exercises(&self, ids: &[ExerciseId]) -> Result<Vec<Exercise>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT id, exercise_type, title, instructions, points, difficulty, content, solution
            FROM exercises
            WHERE id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id_i64("exercise_id", id.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut by_id: HashMap<ExerciseId, Exercise> = HashMap::with_capacity(rows.len());
        for row in rows {
            let exercise = map_exercise_row(&row)?;
            by_id.insert(exercise.id(), exercise);
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(exercise) => out.push(exercise),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }
}
