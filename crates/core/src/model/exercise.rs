use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{ExerciseCatalog, ExerciseType, ValidationError};
use crate::model::ids::ExerciseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise points must be > 0")]
    InvalidPoints,

    #[error("exercise title cannot be empty")]
    EmptyTitle,

    #[error("invalid content: {0}")]
    Content(#[source] ValidationError),

    #[error("invalid solution: {0}")]
    Solution(#[source] ValidationError),
}

//
// ─── SUPPORTING TYPES ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Text keyed by language code (`"en"`, `"ar"`, ...).
///
/// The strings themselves are authored elsewhere; the engine only carries them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    #[must_use]
    pub fn single(lang: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(lang.into(), text.into());
        Self(map)
    }

    /// Text for `lang`, falling back to the first available translation.
    #[must_use]
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.values().all(|t| t.trim().is_empty())
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// Exercise as supplied by authoring, before any checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDraft {
    pub id: ExerciseId,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    pub title: LocalizedText,
    #[serde(default)]
    pub instructions: LocalizedText,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub content: Value,
    pub solution: Value,
}

impl ExerciseDraft {
    /// Validate the draft against the catalog's schema for its type.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError` if points are zero, the title is blank, or the
    /// content/solution payloads do not fit the type.
    pub fn validate(self, catalog: &ExerciseCatalog) -> Result<Exercise, ExerciseError> {
        if self.points == 0 {
            return Err(ExerciseError::InvalidPoints);
        }
        if self.title.is_blank() {
            return Err(ExerciseError::EmptyTitle);
        }
        catalog
            .validate_content(self.exercise_type, &self.content)
            .map_err(ExerciseError::Content)?;
        catalog
            .validate_solution(self.exercise_type, &self.content, &self.solution)
            .map_err(ExerciseError::Solution)?;

        Ok(Exercise {
            id: self.id,
            exercise_type: self.exercise_type,
            title: self.title,
            instructions: self.instructions,
            points: self.points,
            difficulty: self.difficulty,
            content: self.content,
            solution: self.solution,
        })
    }
}

/// A validated, read-only exercise.
///
/// The `solution` is for grading only; student-facing code should go through
/// [`Exercise::question_view`].
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    id: ExerciseId,
    exercise_type: ExerciseType,
    title: LocalizedText,
    instructions: LocalizedText,
    points: u32,
    difficulty: Difficulty,
    content: Value,
    solution: Value,
}

impl Exercise {
    #[must_use]
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    #[must_use]
    pub fn exercise_type(&self) -> ExerciseType {
        self.exercise_type
    }

    #[must_use]
    pub fn title(&self) -> &LocalizedText {
        &self.title
    }

    #[must_use]
    pub fn instructions(&self) -> &LocalizedText {
        &self.instructions
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn content(&self) -> &Value {
        &self.content
    }

    #[must_use]
    pub fn solution(&self) -> &Value {
        &self.solution
    }

    /// Student-facing projection with the solution stripped.
    #[must_use]
    pub fn question_view(&self) -> QuestionView {
        QuestionView {
            exercise_id: self.id,
            exercise_type: self.exercise_type,
            title: self.title.clone(),
            instructions: self.instructions.clone(),
            points: self.points,
            difficulty: self.difficulty,
            content: self.content.clone(),
        }
    }

    /// Back to the authoring shape, e.g. for persistence.
    #[must_use]
    pub fn to_draft(&self) -> ExerciseDraft {
        ExerciseDraft {
            id: self.id,
            exercise_type: self.exercise_type,
            title: self.title.clone(),
            instructions: self.instructions.clone(),
            points: self.points,
            difficulty: self.difficulty,
            content: self.content.clone(),
            solution: self.solution.clone(),
        }
    }
}

/// What the presentation layer may render for an in-progress attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub exercise_id: ExerciseId,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    pub title: LocalizedText,
    pub instructions: LocalizedText,
    pub points: u32,
    pub difficulty: Difficulty,
    pub content: Value,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
