//! Configuration system for the taskforge runtime.
//!
//! Load runtime configuration from TOML or YAML files to control the
//! publish window, the sync poll cadence and the optional target-user
//! override without code changes.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use taskforge_config::RuntimeConfig;
//! use std::time::Duration;
//!
//! let config = RuntimeConfig::from_toml_str(r#"
//!     publish_window_size = 3
//!     sync_interval_millis = 5000
//! "#).unwrap();
//!
//! assert_eq!(config.publish_window_size, 3);
//! assert_eq!(config.sync_interval(), Duration::from_millis(5000));
//! ```
//!
//! Use defaults when the file is missing:
//!
//! ```
//! use taskforge_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::load("taskforge.toml").unwrap_or_default();
//! assert_eq!(config.publish_window_size, 2);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_publish_window_size() -> usize {
    2
}

fn default_sync_interval_millis() -> u64 {
    3_000
}

/// Runtime configuration consumed by the coordination layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// How many leading tasks of each user's queue may be published per
    /// cycle. The planning user is exempt from the bound.
    #[serde(default = "default_publish_window_size")]
    pub publish_window_size: usize,

    /// Pause between synchronization polls, in milliseconds.
    #[serde(default = "default_sync_interval_millis")]
    pub sync_interval_millis: u64,

    /// When set, publishing is restricted to this user's queue.
    #[serde(default)]
    pub target_user: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            publish_window_size: default_publish_window_size(),
            sync_interval_millis: default_sync_interval_millis(),
            target_user: None,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the publish window size.
    pub fn with_publish_window_size(mut self, size: usize) -> Self {
        self.publish_window_size = size;
        self
    }

    /// Sets the sync poll interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_millis = interval.as_millis() as u64;
        self
    }

    /// Sets the target-user override.
    pub fn with_target_user(mut self, user: impl Into<String>) -> Self {
        self.target_user = Some(user.into());
        self
    }

    /// The sync poll interval as a `Duration`.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_millis)
    }

    /// Validates the configured values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a zero publish window or a zero
    /// poll interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish_window_size == 0 {
            return Err(ConfigError::Invalid(
                "publish_window_size must be positive".to_string(),
            ));
        }
        if self.sync_interval_millis == 0 {
            return Err(ConfigError::Invalid(
                "sync_interval_millis must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
