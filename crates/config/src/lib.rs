//! Configuration loading and validation for SAM.
//!
//! Loads configuration from `~/.sam/config.toml` with environment variable
//! overrides. A missing file means defaults; a present but broken file is an
//! error.
//!
//! ```toml
//! [log]
//! level = "info"
//! json = false
//!
//! [reconcile]
//! keep_commands = false
//! defer_swipe = true
//! event_capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log levels accepted by `log.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// The root configuration structure.
///
/// Maps directly to `~/.sam/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamConfig {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// `[log]` — subscriber settings for the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// `[reconcile]` — controller behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Leave command tokens in the narrative when embedding the state block.
    #[serde(default)]
    pub keep_commands: bool,

    /// Yield once before handling a swipe so the host can settle.
    #[serde(default = "default_true")]
    pub defer_swipe: bool,

    /// Capacity of the chat event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            keep_commands: false,
            defer_swipe: true,
            event_capacity: default_event_capacity(),
        }
    }
}

impl SamConfig {
    /// Load configuration from the default location.
    ///
    /// Environment overrides (highest priority):
    /// - `SAM_LOG_LEVEL`
    /// - `SAM_KEEP_COMMANDS` (`true` / `false`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `SAM_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = lookup("SAM_LOG_LEVEL") {
            self.log.level = level.trim().to_ascii_lowercase();
        }

        if let Some(keep) = lookup("SAM_KEEP_COMMANDS") {
            self.reconcile.keep_commands = match keep.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "SAM_KEEP_COMMANDS must be true or false, got '{other}'"
                    )));
                }
            };
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sam")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log.level
            )));
        }

        if self.reconcile.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "reconcile.event_capacity must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Render the given configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml().unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
