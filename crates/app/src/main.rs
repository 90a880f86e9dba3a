//! `assess`: command-line front end for the assessment engine.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use assess_core::model::{AssessmentId, AttemptId, ExerciseId};
use clap::{Parser, Subcommand};
use services::EngineConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "assess", version, about = "Assessment attempt and grading engine")]
struct Cli {
    /// TOML config file; `ASSESS_*` environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate authored exercises and assessments from a JSON file
    CheckExercises {
        /// JSON file with `exercises` and `assessments` arrays
        file: PathBuf,

        /// Store the content once it is valid
        #[arg(long)]
        import: bool,
    },

    /// Re-run auto-grading for an attempt, keeping manual grades
    Regrade { attempt_id: AttemptId },

    /// Award points to one exercise of a submitted attempt
    Grade {
        attempt_id: AttemptId,
        exercise_id: ExerciseId,
        /// Clamped to the exercise's maximum
        #[arg(allow_hyphen_values = true)]
        points: i64,

        #[arg(long)]
        feedback: Option<String>,
    },

    /// Print the expected-vs-submitted grading sheet as JSON
    Sheet { attempt_id: AttemptId },

    /// Lock in the total score once every exercise is graded
    Finalize {
        attempt_id: AttemptId,

        #[arg(long)]
        feedback: Option<String>,
    },

    /// Print cohort progress for an assessment as JSON
    Progress {
        assessment_id: AssessmentId,

        /// Number of students expected to take the assessment
        #[arg(long)]
        roster: usize,
    },
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::CheckExercises { file, import } => {
            commands::content::check_exercises(&config, &file, import).await
        }
        Commands::Regrade { attempt_id } => commands::grading::regrade(&config, attempt_id).await,
        Commands::Grade {
            attempt_id,
            exercise_id,
            points,
            feedback,
        } => commands::grading::grade(&config, attempt_id, exercise_id, points, feedback).await,
        Commands::Sheet { attempt_id } => commands::grading::sheet(&config, attempt_id).await,
        Commands::Finalize {
            attempt_id,
            feedback,
        } => commands::grading::finalize(&config, attempt_id, feedback).await,
        Commands::Progress {
            assessment_id,
            roster,
        } => commands::progress::cohort(&config, assessment_id, roster).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
