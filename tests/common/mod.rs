//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tallyman_lib::core::{Metric, MetricKind, Result, RetryConfig, TallymanError};
use tallyman_lib::storage::{DatabaseStorage, MemoryStorage, MetricStorage};

/// Retry policy with the production attempt budget and millisecond backoff.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        backoff: vec![Duration::from_millis(1), Duration::from_millis(3), Duration::from_millis(5)],
        jitter: false,
    }
}

/// SQLite database file inside `dir`, created on first connect.
pub async fn sqlite_storage(dir: &Path) -> DatabaseStorage {
    let dsn = format!("sqlite://{}?mode=rwc", dir.join("metrics.db").display());
    DatabaseStorage::connect_with(&dsn, 1, Duration::from_secs(5)).await.unwrap()
}

fn outage() -> TallymanError {
    TallymanError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "backend down"))
}

/// Memory backend that fails the first `failures` calls with a transient
/// error. `failures == u32::MAX` fails forever.
pub struct FlakyStorage {
    inner: MemoryStorage,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyStorage {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryStorage::new(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    /// Calls observed so far, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(outage());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetricStorage for FlakyStorage {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn create(&self, metric: &Metric) -> Result<Metric> {
        self.check()?;
        self.inner.create(metric).await
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric> {
        self.check()?;
        self.inner.get(kind, id).await
    }

    async fn get_all(&self) -> Result<Vec<Metric>> {
        self.check()?;
        self.inner.get_all().await
    }

    async fn load(&self, metrics: &[Metric]) -> Result<()> {
        self.check()?;
        self.inner.load(metrics).await
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

/// Sorts metrics by key for order-independent comparisons.
pub fn sorted(mut metrics: Vec<Metric>) -> Vec<Metric> {
    metrics.sort_by(|a, b| a.key().cmp(&b.key()));
    metrics
}
