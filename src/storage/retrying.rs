//! Retry decorator for any [`MetricStorage`].

use super::MetricStorage;
use crate::core::{retry_with_config, Metric, MetricKind, Result, RetryConfig};
use std::sync::atomic::{AtomicU64, Ordering};

/// Wraps a backend and retries transient failures with the configured backoff.
///
/// `ping` and `close` are forwarded once: a liveness check that retried
/// itself would hide the outage it exists to report.
pub struct RetryingStorage<S> {
    inner: S,
    config: RetryConfig,
    retries: AtomicU64,
}

impl<S: MetricStorage> RetryingStorage<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of retries performed so far, across all operations.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn record_retry(&self) -> impl FnMut(u32, &crate::core::TallymanError) + '_ {
        move |_, _| {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait::async_trait]
impl<S: MetricStorage> MetricStorage for RetryingStorage<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn create(&self, metric: &Metric) -> Result<Metric> {
        retry_with_config(&self.config, "create", self.record_retry(), || {
            self.inner.create(metric)
        })
        .await
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric> {
        retry_with_config(&self.config, "get", self.record_retry(), || self.inner.get(kind, id)).await
    }

    async fn get_all(&self) -> Result<Vec<Metric>> {
        retry_with_config(&self.config, "get_all", self.record_retry(), || self.inner.get_all()).await
    }

    async fn load(&self, metrics: &[Metric]) -> Result<()> {
        retry_with_config(&self.config, "load", self.record_retry(), || self.inner.load(metrics)).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn delete(&self, kind: MetricKind, id: &str) -> Result<()> {
        retry_with_config(&self.config, "delete", self.record_retry(), || {
            self.inner.delete(kind, id)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
