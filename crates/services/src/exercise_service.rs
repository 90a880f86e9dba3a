use std::collections::BTreeSet;
use std::sync::Arc;

use assess_core::model::{
    Assessment, AssessmentId, Exercise, ExerciseDraft, ExerciseError, ExerciseId,
};
use assess_core::ExerciseCatalog;
use serde::Deserialize;
use storage::repository::{AssessmentRepository, ExerciseRepository, StorageError};
use tracing::info;

use crate::error::AuthoringError;

/// Assessment as supplied by authoring, before any checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssessmentDraft {
    pub id: AssessmentId,
    pub title: String,
    pub exercise_ids: Vec<ExerciseId>,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
    #[serde(default)]
    pub passing_score: Option<u8>,
}

/// An authored content file: exercises plus the assessments built from them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentBundle {
    #[serde(default)]
    pub exercises: Vec<ExerciseDraft>,
    #[serde(default)]
    pub assessments: Vec<AssessmentDraft>,
}

/// Outcome of a dry-run check over authored exercises.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub accepted: Vec<ExerciseId>,
    pub rejected: Vec<(ExerciseId, ExerciseError)>,
}

impl CheckReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Counts written by [`ExerciseService::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub exercises: usize,
    pub assessments: usize,
}

/// Gatekeeper between authoring and storage: nothing reaches the
/// repositories without passing the catalog.
#[derive(Clone)]
pub struct ExerciseService {
    catalog: ExerciseCatalog,
    exercises: Arc<dyn ExerciseRepository>,
    assessments: Arc<dyn AssessmentRepository>,
}

impl ExerciseService {
    #[must_use]
    pub fn new(
        exercises: Arc<dyn ExerciseRepository>,
        assessments: Arc<dyn AssessmentRepository>,
    ) -> Self {
        Self {
            catalog: ExerciseCatalog::new(),
            exercises,
            assessments,
        }
    }

    /// Validate every draft without storing anything.
    #[must_use]
    pub fn check(&self, drafts: &[ExerciseDraft]) -> CheckReport {
        let mut report = CheckReport::default();
        for draft in drafts {
            match draft.clone().validate(&self.catalog) {
                Ok(exercise) => report.accepted.push(exercise.id()),
                Err(e) => report.rejected.push((draft.id, e)),
            }
        }
        report
    }

    /// Validate and store one exercise, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::InvalidExercise` if the catalog rejects it, or
    /// `AuthoringError::Storage` if persistence fails.
    pub async fn add_exercise(&self, draft: ExerciseDraft) -> Result<Exercise, AuthoringError> {
        let exercise = self.validate(draft)?;
        self.exercises.upsert_exercise(&exercise).await?;
        Ok(exercise)
    }

    /// Store an assessment whose exercises all exist already.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::InvalidAssessment`,
    /// `AuthoringError::MissingExercise`, or storage errors.
    pub async fn add_assessment(&self, draft: AssessmentDraft) -> Result<Assessment, AuthoringError> {
        let assessment = build_assessment(draft)?;
        for &exercise_id in assessment.exercise_ids() {
            self.ensure_exists(assessment.id(), exercise_id, &BTreeSet::new())
                .await?;
        }
        self.assessments.upsert_assessment(&assessment).await?;
        Ok(assessment)
    }

    /// Validate a whole bundle, then store it.
    ///
    /// Nothing is written unless every exercise and assessment is valid.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, or storage errors.
    pub async fn import(&self, bundle: ContentBundle) -> Result<ImportSummary, AuthoringError> {
        let exercises = bundle
            .exercises
            .into_iter()
            .map(|draft| self.validate(draft))
            .collect::<Result<Vec<_>, _>>()?;
        let assessments = bundle
            .assessments
            .into_iter()
            .map(build_assessment)
            .collect::<Result<Vec<_>, _>>()?;

        let bundled: BTreeSet<ExerciseId> = exercises.iter().map(Exercise::id).collect();
        for assessment in &assessments {
            for &exercise_id in assessment.exercise_ids() {
                self.ensure_exists(assessment.id(), exercise_id, &bundled)
                    .await?;
            }
        }

        for exercise in &exercises {
            self.exercises.upsert_exercise(exercise).await?;
        }
        for assessment in &assessments {
            self.assessments.upsert_assessment(assessment).await?;
        }

        let summary = ImportSummary {
            exercises: exercises.len(),
            assessments: assessments.len(),
        };
        info!(
            exercises = summary.exercises,
            assessments = summary.assessments,
            "content imported"
        );
        Ok(summary)
    }

    fn validate(&self, draft: ExerciseDraft) -> Result<Exercise, AuthoringError> {
        let id = draft.id;
        draft
            .validate(&self.catalog)
            .map_err(|source| AuthoringError::InvalidExercise { id, source })
    }

    async fn ensure_exists(
        &self,
        assessment_id: AssessmentId,
        exercise_id: ExerciseId,
        bundled: &BTreeSet<ExerciseId>,
    ) -> Result<(), AuthoringError> {
        if bundled.contains(&exercise_id) {
            return Ok(());
        }
        match self.exercises.get_exercise(exercise_id).await {
            Ok(_) => Ok(()),
            Err(StorageError::NotFound) => Err(AuthoringError::MissingExercise {
                assessment_id,
                exercise_id,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn build_assessment(draft: AssessmentDraft) -> Result<Assessment, AuthoringError> {
    let id = draft.id;
    Assessment::new(
        id,
        draft.title,
        draft.exercise_ids,
        draft.time_limit_secs,
        draft.passing_score,
    )
    .map_err(|source| AuthoringError::InvalidAssessment { id, source })
}
