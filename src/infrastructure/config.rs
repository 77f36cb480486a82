//! Tool settings
//!
//! Settings control how steps run (shell, retries, logging), not what they
//! build. They are read from a YAML file when one exists, otherwise the
//! defaults apply.

use crate::error::{BuildError, Result};
use crate::recovery::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "buildline.yaml";

/// Environment variable overriding the log level
pub const LOG_ENV: &str = "BUILDLINE_LOG";

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Log level
    pub log_level: String,
    /// Shell used to run commands
    pub shell: String,
    /// Primary attempts for the build command
    pub max_attempts: usize,
    /// Backoff unit in milliseconds; the wait after attempt `n` is `n * 2` units
    pub backoff_unit_ms: u64,
    /// Stream command output while it runs
    pub streaming: bool,
    /// Rerun a cached build without cache flags when every attempt failed
    pub fallback_without_cache: bool,
    /// Directory builds run in; defaults to the current directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shell: "sh".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit_ms: 1000,
            streaming: true,
            fallback_without_cache: true,
            workspace: None,
        }
    }
}

impl Settings {
    /// Reads settings from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| BuildError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads `explicit` if given, else `buildline.yaml` if it exists, else defaults.
    ///
    /// `BUILDLINE_LOG` overrides the log level either way.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(level) = std::env::var(LOG_ENV)
            && !level.is_empty()
        {
            settings.log_level = level;
        }

        Ok(settings)
    }

    /// Backoff unit as a duration
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Workspace directory, falling back to the current directory
    #[must_use]
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
    }
}
