//! Tallyman - metrics aggregation store.
//!
//! Tallyman ingests named numeric metrics of two kinds, gauges (last value
//! wins) and counters (deltas accumulate into a running total), and keeps
//! their current values behind one storage contract.
//!
//! # Architecture
//!
//! - `core`: metric model, errors, retry policy and configuration
//! - `storage`: memory backend with JSON snapshots, append-only database
//!   backend, and the retry decorator around both
//! - `service`: validation and aggregation in front of storage
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use tallyman_lib::core::{Metric, RetryConfig};
//! use tallyman_lib::service::MetricService;
//! use tallyman_lib::storage::StorageManager;
//!
//! #[tokio::main]
//! async fn main() -> tallyman_lib::Result<()> {
//!     let manager = StorageManager::new_in_memory(RetryConfig::default());
//!     let service = MetricService::new(manager.backend()?);
//!     service.save(Metric::counter("PollCount", 5)).await?;
//!     manager.close().await
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod service;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, Metric, MetricKind, Result, TallymanError};
