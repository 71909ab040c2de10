//! `mp_config` - Configuration parsing and validation for MySQL Pulse
//!
//! This crate provides:
//! - TOML configuration parsing
//! - Default value handling
//! - Environment variable overrides
//! - Auto-discovery from standard config paths
//! - Per-query start-up overrides (disable, interval)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PulseConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Query catalog settings
    pub queries: QueriesConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Collector poll interval in seconds, also the lookback window of
    /// the activity queries
    pub poll_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Query catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueriesConfig {
    /// Queries left out of the registry
    pub disabled: Vec<String>,

    /// Minimum re-run interval per query name, replacing the built-in one
    pub intervals: HashMap<String, u64>,

    /// Clear a query's last-run stamp when its execution fails, so it is
    /// retried on the next tick instead of after a full interval
    pub reset_on_failure: bool,

    /// Per-query execution timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            disabled: vec![],
            intervals: HashMap::new(),
            reset_on_failure: false,
            timeout_secs: 30,
        }
    }
}

impl PulseConfig {
    /// Standard config file paths, in order of precedence
    #[must_use]
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            // 1. Current directory
            PathBuf::from("mp.toml"),
        ];

        // 2. User config directory (~/.config/mp/mp.toml)
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mp").join("mp.toml"));
        }

        // 3. System config
        paths.push(PathBuf::from("/etc/mp/mp.toml"));

        paths
    }

    /// First existing file among [`Self::config_paths`]
    pub fn find_config_file() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|path| path.exists())
    }

    /// Discover and load configuration from standard paths.
    ///
    /// Returns defaults if no config file is found.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a discovered config file cannot be loaded.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = Self::find_config_file() {
            info!(path = %path.display(), "Loading config from");
            return Self::load(&path);
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Discover config and apply environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if discovery fails or the overridden
    /// config is invalid.
    pub fn discover_with_env() -> Result<Self, ConfigError> {
        let mut config = Self::discover()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PulseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any `MP_*` variable source.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MP_POLL_INTERVAL")
            && let Ok(secs) = val.parse()
        {
            self.global.poll_interval_secs = secs;
        }
        if let Some(val) = lookup("MP_LOG_LEVEL") {
            self.global.log_level = val;
        }
        if let Some(val) = lookup("MP_JSON_LOGS")
            && let Ok(json) = val.parse()
        {
            self.global.json_logs = json;
        }
        if let Some(val) = lookup("MP_RESET_ON_FAILURE")
            && let Ok(reset) = val.parse()
        {
            self.queries.reset_on_failure = reset;
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when validation rules are violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate poll interval
        if self.global.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        // Validate query timeout
        if self.queries.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "queries.timeout_secs must be > 0".to_string(),
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.global.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.global.log_level,
                valid_levels.join(", ")
            )));
        }

        // Validate query names
        let interval_names = self.queries.intervals.keys();
        for name in self.queries.disabled.iter().chain(interval_names) {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "query names in [queries] must not be empty".to_string(),
                ));
            }
        }
        for name in self.queries.intervals.keys() {
            if self.queries.disabled.contains(name) {
                return Err(ConfigError::ValidationError(format!(
                    "Query '{name}' is disabled but has an interval override"
                )));
            }
        }

        Ok(())
    }

    /// Get poll interval as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.global.poll_interval_secs)
    }

    /// Get per-query timeout as Duration
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.queries.timeout_secs)
    }
}
