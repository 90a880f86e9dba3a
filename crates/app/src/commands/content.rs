//! The `assess check-exercises` command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use services::{Clock, ContentBundle, Engine, EngineConfig};
use storage::repository::Storage;
use tracing::info;

pub async fn check_exercises(config: &EngineConfig, file: &Path, import: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let bundle: ContentBundle =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    info!(
        path = %file.display(),
        exercises = bundle.exercises.len(),
        assessments = bundle.assessments.len(),
        "content loaded"
    );

    // a dry run goes through the same import path against throwaway storage
    let engine = if import {
        super::open_engine(config).await?
    } else {
        Engine::new(&Storage::in_memory(), Clock::default_clock())
    };

    let report = engine.exercises().check(&bundle.exercises);
    for (id, error) in &report.rejected {
        println!("  [{id}] INVALID: {error}");
    }
    if !report.is_clean() {
        bail!("{} of {} exercise(s) rejected", report.rejected.len(), bundle.exercises.len());
    }

    let summary = engine
        .exercises()
        .import(bundle)
        .await
        .context("checking assessments")?;
    println!(
        "{} exercise(s) and {} assessment(s) valid.",
        summary.exercises, summary.assessments
    );
    if import {
        println!("Imported into {}.", config.database_url);
    }
    Ok(())
}
