use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::AutoGrade;

/// Who produced the points on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeSource {
    Auto,
    Manual,
}

/// Clamp grader-supplied points into `[0, max_points]`.
#[must_use]
pub fn clamp_points(points: i64, max_points: u32) -> u32 {
    u32::try_from(points.clamp(0, i64::from(max_points))).unwrap_or(0)
}

/// A student's response to one exercise plus whatever grading has produced.
///
/// `points_awarded` stays `None` until the answer is resolved, either by the
/// catalog or by a grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    response: Value,
    is_correct: Option<bool>,
    points_awarded: Option<u32>,
    feedback: Option<String>,
    graded_by: Option<GradeSource>,
}

impl Answer {
    #[must_use]
    pub fn new(response: Value) -> Self {
        Self {
            response,
            is_correct: None,
            points_awarded: None,
            feedback: None,
            graded_by: None,
        }
    }

    /// Placeholder for an exercise the student never answered.
    #[must_use]
    pub fn unanswered() -> Self {
        Self::new(Value::Null)
    }

    #[must_use]
    pub fn response(&self) -> &Value {
        &self.response
    }

    /// `None` if the student left the exercise blank.
    #[must_use]
    pub fn response_opt(&self) -> Option<&Value> {
        if self.response.is_null() {
            None
        } else {
            Some(&self.response)
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        !self.response.is_null()
    }

    #[must_use]
    pub fn is_correct(&self) -> Option<bool> {
        self.is_correct
    }

    #[must_use]
    pub fn points_awarded(&self) -> Option<u32> {
        self.points_awarded
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    #[must_use]
    pub fn graded_by(&self) -> Option<GradeSource> {
        self.graded_by
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.points_awarded.is_some()
    }

    pub(crate) fn apply_auto(&mut self, grade: AutoGrade, max_points: u32) {
        self.is_correct = Some(grade.is_correct);
        self.points_awarded = Some(grade.points.min(max_points));
        self.graded_by = Some(GradeSource::Auto);
    }

    pub(crate) fn apply_manual(
        &mut self,
        points: i64,
        max_points: u32,
        feedback: Option<String>,
    ) -> u32 {
        let awarded = clamp_points(points, max_points);
        self.points_awarded = Some(awarded);
        self.is_correct = Some(awarded == max_points);
        self.feedback = feedback;
        self.graded_by = Some(GradeSource::Manual);
        awarded
    }
}
