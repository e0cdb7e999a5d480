//! Storage backends for metric state.
//!
//! Two interchangeable strategies implement [`MetricStorage`]: the in-memory
//! map with crash-recovery snapshots and the append-only relational store.
//! [`RetryingStorage`] decorates either one, and [`StorageManager`] picks and
//! wires them from configuration.

pub mod backend;
pub mod database;
pub mod manager;
pub mod memory;
pub mod retrying;
pub mod snapshot;

// Re-export commonly used types
pub use backend::{BackendState, MetricStorage};
pub use database::{DatabaseStorage, Dialect};
pub use manager::StorageManager;
pub use memory::MemoryStorage;
pub use retrying::RetryingStorage;
