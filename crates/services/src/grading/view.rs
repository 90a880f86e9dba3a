use assess_core::ExerciseType;
use assess_core::model::{
    AttemptId, AttemptStatus, ExerciseId, GradeSource, LocalizedText, StudentId,
};
use assess_core::score::ScoreSummary;
use serde::Serialize;
use serde_json::Value;

/// One exercise as a grader sees it while grading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingRow {
    pub exercise_id: ExerciseId,
    pub exercise_type: ExerciseType,
    pub title: LocalizedText,
    pub max_points: u32,
    pub autogradable: bool,
    pub submitted: Value,
    pub expected: Value,
    pub points_awarded: Option<u32>,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
    pub graded_by: Option<GradeSource>,
    pub resolved: bool,
}

/// Expected-vs-submitted sheet for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSheet {
    pub attempt_id: AttemptId,
    pub student_id: StudentId,
    pub status: AttemptStatus,
    pub rows: Vec<GradingRow>,
    pub summary: ScoreSummary,
}

impl GradingSheet {
    #[must_use]
    pub fn unresolved(&self) -> impl Iterator<Item = &GradingRow> {
        self.rows.iter().filter(|row| !row.resolved)
    }
}

/// One exercise in the student's result screen.
///
/// `solution` stays empty until the attempt is graded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub exercise_id: ExerciseId,
    pub title: LocalizedText,
    pub max_points: u32,
    pub submitted: Value,
    pub points_awarded: Option<u32>,
    pub is_correct: Option<bool>,
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub attempt_id: AttemptId,
    pub status: AttemptStatus,
    pub total_score: Option<u8>,
    pub passed: Option<bool>,
    pub overall_feedback: Option<String>,
    pub rows: Vec<ResultRow>,
}
