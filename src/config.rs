use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings for rule storage and synchronization.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration.
///
/// ```
/// use rolesync::Config;
///
/// let config = Config::from_toml_str("log_updates = true").unwrap();
/// assert!(config.log_updates);
/// assert_eq!(config.progress_threshold, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Location of the YAML rule document.
    pub rules_path: PathBuf,
    /// How long a confirmation prompt waits for the operator.
    pub confirm_timeout_secs: u64,
    /// Batches smaller than this are applied without progress reports. The
    /// default reports on every non-empty batch.
    pub progress_threshold: usize,
    /// Items processed between two progress reports.
    pub progress_step: usize,
    /// Log every automatic role update, not just races.
    pub log_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/rules.yaml"),
            confirm_timeout_secs: 300,
            progress_threshold: 1,
            progress_step: 10,
            log_updates: false,
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on invalid TOML or unknown keys.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] on I/O failure or invalid contents.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}
