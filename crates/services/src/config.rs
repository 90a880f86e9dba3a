//! Engine configuration: TOML file with per-field defaults, then environment
//! overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_DB_URL: &str = "ASSESS_DB_URL";
pub const ENV_AUTOSAVE_SECS: &str = "ASSESS_AUTOSAVE_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// `SQLite` connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Seconds between draft autosaves while an attempt is open.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_url() -> String {
    "sqlite://assess.sqlite3?mode=rwc".to_string()
}
fn default_autosave_interval() -> u64 {
    30
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            autosave_interval_secs: default_autosave_interval(),
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional TOML file and apply `ASSESS_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or an
    /// override or resulting value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        base.with_overrides(|name| std::env::var(name).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` for unparsable overrides and
    /// `ConfigError::Invalid` if the final config is unusable.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DB_URL) {
            self.database_url = url;
        }
        if let Some(raw) = lookup(ENV_AUTOSAVE_SECS) {
            self.autosave_interval_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_AUTOSAVE_SECS,
                    value: raw.clone(),
                })?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database_url is empty".into()));
        }
        if self.autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}
