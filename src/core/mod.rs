//! Core domain model, errors, configuration and retry policy.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel, LoggingConfig, StorageConfig};
pub use error::{Result, TallymanError};
pub use retry::{retry_with_config, RetryConfig};
pub use types::{Metric, MetricKind, MetricPayload, MetricValue, StorageKey};
