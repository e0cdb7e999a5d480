//! Storage capability trait shared by every backend.

use crate::core::{Metric, MetricKind, Result, TallymanError};
use std::sync::Arc;

/// Trait for storage backend implementations.
///
/// Backends store absolute values only: a counter handed to `create` or
/// `load` already carries its accumulated total.
#[async_trait::async_trait]
pub trait MetricStorage: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Insert or overwrite the value stored for the metric's key.
    async fn create(&self, metric: &Metric) -> Result<Metric>;

    /// Get the current value for a key, `NotFound` if absent.
    async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric>;

    /// Get the current value of every key, in no particular order.
    async fn get_all(&self) -> Result<Vec<Metric>>;

    /// Bulk upsert.
    async fn load(&self, metrics: &[Metric]) -> Result<()>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Remove a key.
    async fn delete(&self, _kind: MetricKind, _id: &str) -> Result<()> {
        Err(TallymanError::Unsupported("delete"))
    }

    /// Release resources. Further calls may fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: MetricStorage + ?Sized> MetricStorage for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn create(&self, metric: &Metric) -> Result<Metric> {
        (**self).create(metric).await
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric> {
        (**self).get(kind, id).await
    }

    async fn get_all(&self) -> Result<Vec<Metric>> {
        (**self).get_all().await
    }

    async fn load(&self, metrics: &[Metric]) -> Result<()> {
        (**self).load(metrics).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn delete(&self, kind: MetricKind, id: &str) -> Result<()> {
        (**self).delete(kind, id).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

/// Lifecycle of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Not constructed yet
    Uninitialized,
    /// Creating the schema or restoring the snapshot
    Initializing,
    /// Serving requests
    Ready,
    /// Shut down
    Closed,
}

impl BackendState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => BackendState::Uninitialized,
            1 => BackendState::Initializing,
            2 => BackendState::Ready,
            _ => BackendState::Closed,
        }
    }

    /// Lowercase state name.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendState::Uninitialized => "uninitialized",
            BackendState::Initializing => "initializing",
            BackendState::Ready => "ready",
            BackendState::Closed => "closed",
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            BackendState::Uninitialized => 0,
            BackendState::Initializing => 1,
            BackendState::Ready => 2,
            BackendState::Closed => 3,
        }
    }
}
