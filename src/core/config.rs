//! Configuration management for tallyman.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by the CLI layer)
//! - Validation and defaults

use crate::core::retry::RetryConfig;
use crate::core::{Result, TallymanError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for tallyman
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Retry policy applied to every storage backend
    pub retry: RetryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Relational store DSN; when set, the durable backend is used
    pub database_dsn: Option<String>,
    /// Snapshot file of the memory backend
    pub file_storage_path: Option<PathBuf>,
    /// Delay between a write and the snapshot it triggers; zero writes synchronously
    #[serde(with = "humantime_serde")]
    pub store_interval: Duration,
    /// Restore the memory backend from its snapshot at startup
    pub restore: bool,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Timeout for acquiring a database connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_dsn: None,
            file_storage_path: Some(PathBuf::from("/tmp/metrics-db.json")),
            store_interval: Duration::from_secs(300),
            restore: true,
            max_connections: 5,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl StorageConfig {
    /// In-memory storage without snapshots.
    pub fn in_memory() -> Self {
        StorageConfig {
            file_storage_path: None,
            restore: false,
            ..Default::default()
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(dsn) = &self.storage.database_dsn {
            if dsn.trim().is_empty() {
                return Err(TallymanError::config("database_dsn must not be empty when set"));
            }
        }

        if self.storage.max_connections == 0 {
            return Err(TallymanError::config("max_connections must be greater than 0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(TallymanError::config("retry.max_attempts must be greater than 0"));
        }

        if self.retry.backoff.is_empty() {
            return Err(TallymanError::config("retry.backoff must list at least one delay"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| TallymanError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Use the durable backend at this DSN
    pub fn database_dsn<S: Into<String>>(mut self, dsn: S) -> Self {
        self.config.storage.database_dsn = Some(dsn.into());
        self
    }

    /// Set the snapshot file path
    pub fn file_storage_path(mut self, path: PathBuf) -> Self {
        self.config.storage.file_storage_path = Some(path);
        self
    }

    /// Set the snapshot interval
    pub fn store_interval(mut self, interval: Duration) -> Self {
        self.config.storage.store_interval = interval;
        self
    }

    /// Enable or disable restore-from-snapshot
    pub fn restore(mut self, restore: bool) -> Self {
        self.config.storage.restore = restore;
        self
    }

    /// Set the retry attempt budget
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set the retry backoff schedule
    pub fn backoff(mut self, schedule: Vec<Duration>) -> Self {
        self.config.retry.backoff = schedule;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
