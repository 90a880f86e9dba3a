//! The `assess progress` command.

use anyhow::{Context, Result};
use assess_core::model::AssessmentId;
use services::EngineConfig;

pub async fn cohort(config: &EngineConfig, assessment_id: AssessmentId, roster: usize) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let progress = engine
        .progress()
        .cohort_progress(assessment_id, roster)
        .await
        .with_context(|| format!("loading progress for assessment {assessment_id}"))?;
    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
