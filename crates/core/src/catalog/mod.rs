//! Exercise type registry.
//!
//! Each `ExerciseType` owns exactly one row in the dispatch table built by
//! [`ExerciseType::handler`]. The row carries the type's category, whether it
//! can be graded without a human, and the validation/grading functions for its
//! payloads. Adding a type means adding one variant and one row.

mod error;
mod kinds;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{CatalogError, Payload, ValidationError};

use kinds::ExerciseKind;

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

/// Coarse grouping of exercise types, mostly for presentation and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Choice,
    Text,
    Arrangement,
    Media,
    Open,
}

/// Tag identifying an exercise's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    ShortAnswer,
    FillInTheBlank,
    Numeric,
    Matching,
    Ordering,
    DragAndDrop,
    Listening,
    LongAnswer,
    Speaking,
    FileUpload,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 13] = [
        ExerciseType::MultipleChoice,
        ExerciseType::MultipleSelect,
        ExerciseType::TrueFalse,
        ExerciseType::ShortAnswer,
        ExerciseType::FillInTheBlank,
        ExerciseType::Numeric,
        ExerciseType::Matching,
        ExerciseType::Ordering,
        ExerciseType::DragAndDrop,
        ExerciseType::Listening,
        ExerciseType::LongAnswer,
        ExerciseType::Speaking,
        ExerciseType::FileUpload,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::MultipleChoice => "MULTIPLE_CHOICE",
            ExerciseType::MultipleSelect => "MULTIPLE_SELECT",
            ExerciseType::TrueFalse => "TRUE_FALSE",
            ExerciseType::ShortAnswer => "SHORT_ANSWER",
            ExerciseType::FillInTheBlank => "FILL_IN_THE_BLANK",
            ExerciseType::Numeric => "NUMERIC",
            ExerciseType::Matching => "MATCHING",
            ExerciseType::Ordering => "ORDERING",
            ExerciseType::DragAndDrop => "DRAG_AND_DROP",
            ExerciseType::Listening => "LISTENING",
            ExerciseType::LongAnswer => "LONG_ANSWER",
            ExerciseType::Speaking => "SPEAKING",
            ExerciseType::FileUpload => "FILE_UPLOAD",
        }
    }

    /// The dispatch table: one row per tag.
    fn handler(self) -> Handler {
        match self {
            ExerciseType::MultipleChoice => Handler::of::<kinds::MultipleChoice>(),
            ExerciseType::MultipleSelect => Handler::of::<kinds::MultipleSelect>(),
            ExerciseType::TrueFalse => Handler::of::<kinds::TrueFalse>(),
            ExerciseType::ShortAnswer => Handler::of::<kinds::ShortAnswer>(),
            ExerciseType::FillInTheBlank => Handler::of::<kinds::FillInTheBlank>(),
            ExerciseType::Numeric => Handler::of::<kinds::Numeric>(),
            ExerciseType::Matching => Handler::of::<kinds::Matching>(),
            ExerciseType::Ordering => Handler::of::<kinds::Ordering>(),
            ExerciseType::DragAndDrop => Handler::of::<kinds::DragAndDrop>(),
            ExerciseType::Listening => Handler::of::<kinds::Listening>(),
            ExerciseType::LongAnswer => Handler::of::<kinds::LongAnswer>(),
            ExerciseType::Speaking => Handler::of::<kinds::Speaking>(),
            ExerciseType::FileUpload => Handler::of::<kinds::FileUpload>(),
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        ExerciseType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| CatalogError::UnknownExerciseType(tag.to_owned()))
    }
}

/// Static facts about an exercise type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub exercise_type: ExerciseType,
    pub category: ExerciseCategory,
    pub autogradable: bool,
}

/// Outcome of grading one answer automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoGrade {
    pub is_correct: bool,
    pub points: u32,
}

//
// ─── DISPATCH ──────────────────────────────────────────────────────────────────
//

type ContentFn = fn(&Value) -> Result<(), ValidationError>;
type PairFn = fn(&Value, &Value) -> Result<(), ValidationError>;
type GradeFn = fn(&Value, &Value, Option<&Value>) -> Result<bool, ValidationError>;

#[derive(Clone, Copy)]
struct Handler {
    category: ExerciseCategory,
    autogradable: bool,
    content: ContentFn,
    solution: PairFn,
    answer: PairFn,
    grade: GradeFn,
}

impl Handler {
    fn of<K: ExerciseKind>() -> Self {
        Self {
            category: K::CATEGORY,
            autogradable: K::AUTOGRADABLE,
            content: check_content::<K>,
            solution: check_solution::<K>,
            answer: check_answer::<K>,
            grade: grade::<K>,
        }
    }
}

fn parse<T: DeserializeOwned>(payload: Payload, value: &Value) -> Result<T, ValidationError> {
    T::deserialize(value).map_err(|e| ValidationError::Malformed {
        payload,
        reason: e.to_string(),
    })
}

fn check_content<K: ExerciseKind>(content: &Value) -> Result<(), ValidationError> {
    K::check_content(&parse(Payload::Content, content)?)
}

fn check_solution<K: ExerciseKind>(content: &Value, solution: &Value) -> Result<(), ValidationError> {
    let content = parse(Payload::Content, content)?;
    K::check_content(&content)?;
    K::check_solution(&content, &parse(Payload::Solution, solution)?)
}

fn check_answer<K: ExerciseKind>(content: &Value, answer: &Value) -> Result<(), ValidationError> {
    let content = parse(Payload::Content, content)?;
    K::check_answer(&content, &parse(Payload::Answer, answer)?)
}

/// Malformed stored content or solution is an error; anything wrong with the
/// student's side (absent, wrong shape, out of range) is simply incorrect.
fn grade<K: ExerciseKind>(
    content: &Value,
    solution: &Value,
    answer: Option<&Value>,
) -> Result<bool, ValidationError> {
    let content: K::Content = parse(Payload::Content, content)?;
    let solution: K::Solution = parse(Payload::Solution, solution)?;

    let Some(answer) = answer.filter(|a| !a.is_null()) else {
        return Ok(false);
    };
    let Ok(answer) = K::Answer::deserialize(answer) else {
        return Ok(false);
    };
    if K::check_answer(&content, &answer).is_err() {
        return Ok(false);
    }
    Ok(K::is_correct(&content, &solution, &answer))
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Single source of truth for exercise payload shapes and grading rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExerciseCatalog;

impl ExerciseCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve a raw tag into a registered type.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownExerciseType` for unregistered tags.
    pub fn resolve(&self, tag: &str) -> Result<ExerciseType, CatalogError> {
        tag.parse()
    }

    #[must_use]
    pub fn describe(&self, exercise_type: ExerciseType) -> TypeDescriptor {
        let handler = exercise_type.handler();
        TypeDescriptor {
            exercise_type,
            category: handler.category,
            autogradable: handler.autogradable,
        }
    }

    /// Every registered type, in declaration order.
    pub fn types(&self) -> impl Iterator<Item = TypeDescriptor> + '_ {
        ExerciseType::ALL.into_iter().map(|t| self.describe(t))
    }

    /// Check a student-visible content payload against its type's schema.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the payload is malformed or out of range.
    pub fn validate_content(
        &self,
        exercise_type: ExerciseType,
        content: &Value,
    ) -> Result<(), ValidationError> {
        (exercise_type.handler().content)(content)
    }

    /// Check that a solution is well-formed and fits its content.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if either payload is malformed or they disagree.
    pub fn validate_solution(
        &self,
        exercise_type: ExerciseType,
        content: &Value,
        solution: &Value,
    ) -> Result<(), ValidationError> {
        (exercise_type.handler().solution)(content, solution)
    }

    /// Check a student's answer before it is stored in an attempt.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for malformed or out-of-range answers.
    pub fn validate_answer(
        &self,
        exercise_type: ExerciseType,
        content: &Value,
        answer: &Value,
    ) -> Result<(), ValidationError> {
        (exercise_type.handler().answer)(content, answer)
    }

    /// Grade an answer for an autogradable type.
    ///
    /// All-or-nothing: a correct answer earns `max_points`, anything else
    /// (including no answer at all) earns zero. The result depends only on the
    /// arguments, so re-running it after a content fix is safe.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotAutogradable` for manual-only types and
    /// `CatalogError::InvalidExercise` if the stored content or solution is malformed.
    pub fn autograde(
        &self,
        exercise_type: ExerciseType,
        content: &Value,
        solution: &Value,
        answer: Option<&Value>,
        max_points: u32,
    ) -> Result<AutoGrade, CatalogError> {
        let handler = exercise_type.handler();
        if !handler.autogradable {
            return Err(CatalogError::NotAutogradable(exercise_type));
        }
        let is_correct = (handler.grade)(content, solution, answer).map_err(|source| {
            CatalogError::InvalidExercise {
                exercise_type,
                source,
            }
        })?;
        Ok(AutoGrade {
            is_correct,
            points: if is_correct { max_points } else { 0 },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> ExerciseCatalog {
        ExerciseCatalog::new()
    }

    fn grade(
        ty: ExerciseType,
        content: Value,
        solution: Value,
        answer: Option<Value>,
        points: u32,
    ) -> AutoGrade {
        catalog()
            .autograde(ty, &content, &solution, answer.as_ref(), points)
            .unwrap()
    }

    #[test]
    fn every_tag_round_trips_through_its_name() {
        for ty in ExerciseType::ALL {
            assert_eq!(ty.as_str().parse::<ExerciseType>().unwrap(), ty);
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, json!(ty.as_str()));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = catalog().resolve("CROSSWORD").unwrap_err();
        assert_eq!(err, CatalogError::UnknownExerciseType("CROSSWORD".into()));
    }

    #[test]
    fn describe_reports_manual_only_open_types() {
        let c = catalog();
        assert!(c.describe(ExerciseType::MultipleChoice).autogradable);
        assert!(!c.describe(ExerciseType::LongAnswer).autogradable);
        assert_eq!(
            c.describe(ExerciseType::Listening).category,
            ExerciseCategory::Media
        );
        assert_eq!(c.types().count(), ExerciseType::ALL.len());
    }

    #[test]
    fn multiple_choice_is_all_or_nothing() {
        let content = json!({ "options": ["6", "7", "8", "9"] });
        let solution = json!({ "correctAnswer": 2 });

        let right = grade(
            ExerciseType::MultipleChoice,
            content.clone(),
            solution.clone(),
            Some(json!(2)),
            10,
        );
        assert_eq!(right, AutoGrade { is_correct: true, points: 10 });

        let wrong = grade(
            ExerciseType::MultipleChoice,
            content,
            solution,
            Some(json!(0)),
            10,
        );
        assert_eq!(wrong, AutoGrade { is_correct: false, points: 0 });
    }

    #[test]
    fn missing_answer_is_incorrect_not_an_error() {
        let result = grade(
            ExerciseType::TrueFalse,
            json!({ "statement": "The sky is green" }),
            json!({ "correctAnswer": false }),
            None,
            5,
        );
        assert_eq!(result, AutoGrade { is_correct: false, points: 0 });

        let null = grade(
            ExerciseType::TrueFalse,
            json!({ "statement": "The sky is green" }),
            json!({ "correctAnswer": false }),
            Some(Value::Null),
            5,
        );
        assert!(!null.is_correct);
    }

    #[test]
    fn short_answer_trims_and_ignores_case() {
        let result = grade(
            ExerciseType::ShortAnswer,
            json!({}),
            json!({ "acceptableAnswers": ["Paris"], "caseSensitive": false }),
            Some(json!("  PARIS  ")),
            4,
        );
        assert!(result.is_correct);
        assert_eq!(result.points, 4);
    }

    #[test]
    fn short_answer_respects_case_sensitive_flag() {
        let result = grade(
            ExerciseType::ShortAnswer,
            json!({}),
            json!({ "acceptableAnswers": ["Paris"], "caseSensitive": true }),
            Some(json!(" paris")),
            4,
        );
        assert!(!result.is_correct);
    }

    #[test]
    fn long_answer_is_never_autograded() {
        let err = catalog()
            .autograde(
                ExerciseType::LongAnswer,
                &json!({}),
                &json!({ "sampleAnswer": "anything", "rubric": "be thorough" }),
                Some(&json!("anything")),
                10,
            )
            .unwrap_err();
        assert_eq!(err, CatalogError::NotAutogradable(ExerciseType::LongAnswer));
    }

    #[test]
    fn out_of_range_selection_fails_validation() {
        let err = catalog()
            .validate_answer(
                ExerciseType::MultipleChoice,
                &json!({ "options": ["a", "b"] }),
                &json!(5),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::IndexOutOfRange {
                field: "selected option",
                index: 5,
                len: 2
            }
        );
    }

    #[test]
    fn malformed_content_is_reported() {
        let err = catalog()
            .validate_content(ExerciseType::MultipleChoice, &json!({ "choices": [] }))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Malformed {
                payload: Payload::Content,
                ..
            }
        ));
    }

    #[test]
    fn solution_must_fit_content() {
        let err = catalog()
            .validate_solution(
                ExerciseType::Ordering,
                &json!({ "items": ["a", "b", "c"] }),
                &json!({ "order": [0, 1, 1] }),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { .. }));
    }

    #[test]
    fn corrupt_solution_surfaces_as_catalog_error() {
        let err = catalog()
            .autograde(
                ExerciseType::MultipleChoice,
                &json!({ "options": ["a", "b"] }),
                &json!({ "answer": "a" }),
                Some(&json!(0)),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidExercise { .. }));
    }

    #[test]
    fn multiple_select_compares_sets() {
        let content = json!({ "options": ["a", "b", "c"] });
        let solution = json!({ "correctAnswers": [0, 2] });
        assert!(
            grade(
                ExerciseType::MultipleSelect,
                content.clone(),
                solution.clone(),
                Some(json!([2, 0])),
                3
            )
            .is_correct
        );
        assert!(
            !grade(
                ExerciseType::MultipleSelect,
                content,
                solution,
                Some(json!([0])),
                3
            )
            .is_correct
        );
    }

    #[test]
    fn fill_in_the_blank_requires_every_blank() {
        let content = json!({ "text": "___ is the capital of ___", "blanks": 2 });
        let solution = json!({ "blanks": [["Paris"], ["France", "la France"]] });
        assert!(
            grade(
                ExerciseType::FillInTheBlank,
                content.clone(),
                solution.clone(),
                Some(json!(["paris", " LA FRANCE"])),
                2
            )
            .is_correct
        );
        assert!(
            !grade(
                ExerciseType::FillInTheBlank,
                content,
                solution,
                Some(json!(["paris", "Spain"])),
                2
            )
            .is_correct
        );
    }

    #[test]
    fn numeric_uses_tolerance() {
        let solution = json!({ "value": 3.14, "tolerance": 0.01 });
        assert!(grade(ExerciseType::Numeric, json!({}), solution.clone(), Some(json!(3.145)), 1).is_correct);
        assert!(!grade(ExerciseType::Numeric, json!({}), solution, Some(json!(3.2)), 1).is_correct);
    }

    #[test]
    fn drag_and_drop_needs_every_item_placed() {
        let content = json!({ "items": ["cat", "oak"], "zones": ["animal", "plant"] });
        let solution = json!({ "placements": [0, 1] });
        assert!(
            grade(
                ExerciseType::DragAndDrop,
                content.clone(),
                solution.clone(),
                Some(json!([0, 1])),
                2
            )
            .is_correct
        );
        assert!(
            !grade(
                ExerciseType::DragAndDrop,
                content,
                solution,
                Some(json!([0, null])),
                2
            )
            .is_correct
        );
    }

    #[test]
    fn listening_requires_a_valid_audio_url() {
        let err = catalog()
            .validate_content(
                ExerciseType::Listening,
                &json!({ "audioUrl": "not a url", "options": ["a", "b"] }),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "audioUrl", .. }));
    }

    #[test]
    fn file_upload_checks_extension() {
        let content = json!({ "allowedExtensions": [".pdf", "docx"] });
        let c = catalog();
        assert!(
            c.validate_answer(
                ExerciseType::FileUpload,
                &content,
                &json!({ "fileName": "essay.PDF", "url": "https://cdn.example.com/essay.pdf" }),
            )
            .is_ok()
        );
        assert!(
            c.validate_answer(
                ExerciseType::FileUpload,
                &content,
                &json!({ "fileName": "essay.exe", "url": "https://cdn.example.com/essay.exe" }),
            )
            .is_err()
        );
    }

    #[test]
    fn autograde_is_deterministic() {
        let content = json!({ "left": ["a", "b"], "right": ["1", "2", "3"] });
        let solution = json!({ "pairs": [2, 0] });
        let answer = json!([2, 0]);
        let first = grade(
            ExerciseType::Matching,
            content.clone(),
            solution.clone(),
            Some(answer.clone()),
            6,
        );
        for _ in 0..10 {
            let again = grade(
                ExerciseType::Matching,
                content.clone(),
                solution.clone(),
                Some(answer.clone()),
                6,
            );
            assert_eq!(again, first);
        }
    }

    #[test]
    fn wrongly_shaped_answer_grades_as_incorrect() {
        let result = grade(
            ExerciseType::MultipleChoice,
            json!({ "options": ["a", "b"] }),
            json!({ "correctAnswer": 1 }),
            Some(json!("b")),
            2,
        );
        assert_eq!(result, AutoGrade { is_correct: false, points: 0 });
    }
}
