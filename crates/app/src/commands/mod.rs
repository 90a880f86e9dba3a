pub mod content;
pub mod grading;
pub mod progress;

use std::path::Path;

use anyhow::{Context, Result, bail};
use services::{Clock, Engine, EngineConfig};

/// Open the configured database, creating its directory if needed.
pub async fn open_engine(config: &EngineConfig) -> Result<Engine> {
    prepare_sqlite_dir(&config.database_url)?;
    Engine::sqlite(config, Clock::default_clock())
        .await
        .with_context(|| format!("opening database {}", config.database_url))
}

fn prepare_sqlite_dir(db_url: &str) -> Result<()> {
    if db_url.starts_with("sqlite::memory:") || db_url.contains("mode=memory") {
        return Ok(());
    }

    let Some(rest) = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
    else {
        bail!("unsupported database url {db_url}");
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("database url {db_url} has no path");
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}
