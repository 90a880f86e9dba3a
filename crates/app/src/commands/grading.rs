//! Grader-side grading commands.

use anyhow::{Context, Result};
use assess_core::model::{AttemptId, ExerciseId};
use services::EngineConfig;

pub async fn regrade(config: &EngineConfig, attempt_id: AttemptId) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let summary = engine
        .grading()
        .regrade(attempt_id)
        .await
        .with_context(|| format!("re-grading attempt {attempt_id}"))?;

    match summary.total_score {
        Some(total) => println!("Attempt {attempt_id}: {total}/100"),
        None => println!(
            "Attempt {attempt_id}: {} exercise(s) awaiting manual grading",
            summary.unresolved.len()
        ),
    }
    Ok(())
}

pub async fn grade(
    config: &EngineConfig,
    attempt_id: AttemptId,
    exercise_id: ExerciseId,
    points: i64,
    feedback: Option<String>,
) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let outcome = engine
        .grading()
        .manual_grade(attempt_id, exercise_id, points, feedback)
        .await
        .with_context(|| format!("grading exercise {exercise_id} of attempt {attempt_id}"))?;

    println!(
        "Exercise {exercise_id}: {} point(s), {} exercise(s) still unresolved",
        outcome.points_awarded,
        outcome.summary.unresolved.len()
    );
    Ok(())
}

pub async fn sheet(config: &EngineConfig, attempt_id: AttemptId) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let sheet = engine
        .grading()
        .grading_sheet(attempt_id)
        .await
        .with_context(|| format!("loading attempt {attempt_id}"))?;
    println!("{}", serde_json::to_string_pretty(&sheet)?);
    Ok(())
}

pub async fn finalize(
    config: &EngineConfig,
    attempt_id: AttemptId,
    feedback: Option<String>,
) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let total = engine
        .grading()
        .finalize_grading(attempt_id, feedback)
        .await
        .with_context(|| format!("finalizing attempt {attempt_id}"))?;
    println!("Attempt {attempt_id} graded: {total}/100");
    Ok(())
}
