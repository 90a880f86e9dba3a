#![allow(dead_code)]

use assess_core::model::{
    Assessment, AssessmentId, Difficulty, Exercise, ExerciseDraft, ExerciseId, LocalizedText,
};
use assess_core::{ExerciseCatalog, ExerciseType};
use serde_json::{json, Value};
use storage::repository::{AssessmentRepository, ExerciseRepository, Storage};

pub const MC: ExerciseId = ExerciseId::new(1);
pub const SHORT: ExerciseId = ExerciseId::new(2);
pub const ESSAY: ExerciseId = ExerciseId::new(3);

/// Multiple choice plus short answer, 10 points each, 600 s advisory limit.
pub const QUIZ: AssessmentId = AssessmentId::new(1);
/// Multiple choice (10) plus a 20 point essay.
pub const ESSAY_TEST: AssessmentId = AssessmentId::new(2);

pub fn exercise(
    id: ExerciseId,
    exercise_type: ExerciseType,
    points: u32,
    content: Value,
    solution: Value,
) -> Exercise {
    ExerciseDraft {
        id,
        exercise_type,
        title: LocalizedText::single("en", format!("Exercise {id}")),
        instructions: LocalizedText::default(),
        points,
        difficulty: Difficulty::Medium,
        content,
        solution,
    }
    .validate(&ExerciseCatalog::new())
    .unwrap()
}

pub fn multiple_choice() -> Exercise {
    exercise(
        MC,
        ExerciseType::MultipleChoice,
        10,
        json!({ "options": ["6", "7", "8", "9"] }),
        json!({ "correctAnswer": 2 }),
    )
}

pub fn short_answer() -> Exercise {
    exercise(
        SHORT,
        ExerciseType::ShortAnswer,
        10,
        json!({}),
        json!({ "acceptableAnswers": ["Paris"], "caseSensitive": false }),
    )
}

pub fn long_answer() -> Exercise {
    exercise(
        ESSAY,
        ExerciseType::LongAnswer,
        20,
        json!({ "maxWords": 200 }),
        json!({ "rubric": "Two arguments, one counterpoint" }),
    )
}

pub async fn seed(storage: &Storage) {
    for exercise in [multiple_choice(), short_answer(), long_answer()] {
        storage.exercises.upsert_exercise(&exercise).await.unwrap();
    }
    let quiz = Assessment::new(QUIZ, "Quiz", vec![MC, SHORT], Some(600), Some(50)).unwrap();
    let essay = Assessment::new(ESSAY_TEST, "Essay", vec![MC, ESSAY], None, None).unwrap();
    storage.assessments.upsert_assessment(&quiz).await.unwrap();
    storage.assessments.upsert_assessment(&essay).await.unwrap();
}
