//! Configuration management for wildline
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! missing file or a file with only some sections set is fine.
//!
//! Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Completion sources and filtering
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Command history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pipeline engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for a single completion run in milliseconds (0 = none)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// How long interactive callers wait for a deferred run, in milliseconds
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

/// Completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Maximum number of buffer search matches (0 = unlimited)
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Match candidates as case-insensitive subsequences instead of prefixes
    #[serde(default)]
    pub fuzzy_filter: bool,

    /// Always list dot-files
    #[serde(default)]
    pub show_hidden: bool,

    /// Glob patterns of file names never offered
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Directories searched by `:find` and friends, relative to the
    /// completion root unless absolute
    #[serde(default = "default_search_path")]
    pub path: Vec<String>,

    /// Install the built-in pipeline when none is configured
    #[serde(default = "default_use_default_pipeline")]
    pub use_default_pipeline: bool,
}

/// Command history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of history entries
    #[serde(default = "default_max_history_size")]
    pub max_size: usize,

    /// Path to history file
    #[serde(default = "default_history_file")]
    pub file_path: PathBuf,

    /// Enable history persistence
    #[serde(default = "default_persist_history")]
    pub persist: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_deadline_ms() -> u64 {
    1000
}

fn default_wait_ms() -> u64 {
    250
}

fn default_max_candidates() -> usize {
    300
}

fn default_ignore() -> Vec<String> {
    vec!["*.o".to_string(), "*.pyc".to_string(), "*.swp".to_string()]
}

fn default_search_path() -> Vec<String> {
    vec![".".to_string()]
}

fn default_use_default_pipeline() -> bool {
    true
}

fn default_max_history_size() -> usize {
    1000
}

fn default_history_file() -> PathBuf {
    Config::home_dir().join("history")
}

fn default_persist_history() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    false
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            wait_ms: default_wait_ms(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            fuzzy_filter: false,
            show_hidden: false,
            ignore: default_ignore(),
            path: default_search_path(),
            use_default_pipeline: default_use_default_pipeline(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_history_size(),
            file_path: default_history_file(),
            persist: default_persist_history(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, or the default path when `None`
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file the user named explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Directory holding wildline's files
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wildline")
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Serialize as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.engine.deadline_ms > 0 && self.engine.wait_ms > self.engine.deadline_ms {
            return Err(ConfigError::InvalidValue {
                field: "engine.wait_ms".to_string(),
                value: format!(
                    "{} (exceeds engine.deadline_ms = {})",
                    self.engine.wait_ms, self.engine.deadline_ms
                ),
            }
            .into());
        }

        for pattern in &self.completion.ignore {
            if pattern.is_empty()
                || pattern.contains(std::path::is_separator)
                || glob::Pattern::new(pattern).is_err()
            {
                return Err(ConfigError::InvalidValue {
                    field: "completion.ignore".to_string(),
                    value: pattern.clone(),
                }
                .into());
            }
        }

        if self.history.persist && self.history.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "history.max_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Run deadline, `None` when disabled
    pub fn deadline(&self) -> Option<Duration> {
        (self.engine.deadline_ms > 0).then(|| Duration::from_millis(self.engine.deadline_ms))
    }

    /// How long interactive callers wait for a deferred result
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.engine.wait_ms)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WildError;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.deadline_ms, 1000);
        assert_eq!(config.completion.max_candidates, 300);
        assert!(config.completion.use_default_pipeline);
        assert_eq!(config.completion.path, vec![".".to_string()]);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [completion]
            fuzzy_filter = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert!(config.completion.fuzzy_filter);
        assert_eq!(config.completion.max_candidates, 300);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.engine.wait_ms, 250);
    }

    #[test]
    fn test_invalid_format() {
        let err = Config::from_toml("[engine]\ndeadline_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, WildError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("none.toml"))).unwrap_err();
        assert!(matches!(err, WildError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.engine.deadline_ms = 0;
        config.completion.show_hidden = true;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.engine.deadline_ms, 0);
        assert!(loaded.completion.show_hidden);
        assert_eq!(loaded.deadline(), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.engine.wait_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.completion.ignore = vec!["build/*".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.completion.ignore = vec!["*.[oa".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.history.max_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.deadline(), Some(Duration::from_millis(1000)));
        assert_eq!(config.wait(), Duration::from_millis(250));
    }
}
