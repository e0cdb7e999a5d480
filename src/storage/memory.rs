//! In-memory storage backend.
//!
//! A single map from [`StorageKey`] to the stored absolute value, guarded by
//! one readers/writer lock. Writes schedule a debounced snapshot: the first
//! write after a quiet period starts a timer, and when it fires the whole map
//! as it is at that moment is written through the snapshot codec. Writes that
//! land while the timer is pending ride along with it. Snapshot writes are
//! serialized, and the map is read only once the write lock is held, so the
//! newest contents always land last.

use super::{snapshot, MetricStorage};
use crate::core::{Metric, MetricKind, MetricValue, Result, StorageConfig, StorageKey, TallymanError};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

type MetricMap = AHashMap<StorageKey, MetricValue>;

/// Where and how often the map is snapshotted.
#[derive(Debug, Clone)]
struct SnapshotSchedule {
    path: PathBuf,
    interval: Duration,
    /// Set while a snapshot task is sleeping.
    pending: Arc<AtomicBool>,
    /// Held across read-map-then-write so snapshot writes never interleave.
    writer: Arc<Mutex<()>>,
}

/// Map-based metric store with optional crash-recovery snapshots.
pub struct MemoryStorage {
    metrics: Arc<RwLock<MetricMap>>,
    snapshot: Option<SnapshotSchedule>,
}

impl MemoryStorage {
    /// Create a store that never snapshots.
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(MetricMap::new())),
            snapshot: None,
        }
    }

    /// Create a store that snapshots to `path` `interval` after a write.
    pub fn with_snapshot(path: PathBuf, interval: Duration) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(MetricMap::new())),
            snapshot: Some(SnapshotSchedule {
                path,
                interval,
                pending: Arc::new(AtomicBool::new(false)),
                writer: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// Create storage from the storage section of the configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        match &config.file_storage_path {
            Some(path) => Self::with_snapshot(path.clone(), config.store_interval),
            None => Self::new(),
        }
    }

    /// Snapshot file, if snapshots are enabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|s| s.path.as_path())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Replay every metric of the snapshot at `path`, with the overwrite
    /// semantics of [`MetricStorage::create`].
    ///
    /// Replaying schedules no snapshot: the file being read already holds
    /// this state. Returns the number of restored metrics. Missing or empty
    /// files surface as [`TallymanError::SnapshotMissing`] /
    /// [`TallymanError::SnapshotEmpty`]; callers decide whether that is an
    /// error.
    pub async fn restore(&self, path: &Path) -> Result<usize> {
        let metrics = snapshot::load(path).await?;
        insert_all(&self.metrics, &metrics);
        tracing::info!(path = %path.display(), restored = metrics.len(), "restored metrics from snapshot");
        Ok(metrics.len())
    }

    /// Write the current map contents to the snapshot file right away.
    pub async fn flush(&self) -> Result<()> {
        match &self.snapshot {
            Some(schedule) => write_snapshot(&self.metrics, schedule).await,
            None => Ok(()),
        }
    }

    async fn schedule_snapshot(&self) {
        let Some(schedule) = &self.snapshot else {
            return;
        };

        if schedule.interval.is_zero() {
            if let Err(e) = write_snapshot(&self.metrics, schedule).await {
                tracing::error!(path = %schedule.path.display(), error = %e, "failed to write snapshot");
            }
            return;
        }

        if schedule.pending.swap(true, Ordering::AcqRel) {
            return;
        }

        // A weak handle lets the store be dropped while a snapshot is pending.
        let metrics: Weak<RwLock<MetricMap>> = Arc::downgrade(&self.metrics);
        let schedule = schedule.clone();

        tokio::spawn(async move {
            tokio::time::sleep(schedule.interval).await;
            schedule.pending.store(false, Ordering::Release);

            let Some(metrics) = metrics.upgrade() else {
                return;
            };
            if let Err(e) = write_snapshot(&metrics, &schedule).await {
                tracing::error!(path = %schedule.path.display(), error = %e, "failed to write snapshot");
            }
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(metrics: &RwLock<MetricMap>) -> Vec<Metric> {
    metrics
        .read()
        .iter()
        .map(|(key, value)| Metric {
            id: key.id.clone(),
            value: *value,
        })
        .collect()
}

fn insert_all(metrics: &RwLock<MetricMap>, batch: &[Metric]) {
    let mut map = metrics.write();
    for metric in batch {
        map.insert(metric.key(), metric.value);
    }
}

async fn write_snapshot(metrics: &RwLock<MetricMap>, schedule: &SnapshotSchedule) -> Result<()> {
    let _writer = schedule.writer.lock().await;
    let contents = collect(metrics);
    snapshot::save(&schedule.path, &contents).await
}

#[async_trait::async_trait]
impl MetricStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, metric: &Metric) -> Result<Metric> {
        self.metrics.write().insert(metric.key(), metric.value);
        self.schedule_snapshot().await;
        Ok(metric.clone())
    }

    async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric> {
        let key = StorageKey::new(kind, id);
        let value = self.metrics.read().get(&key).copied();
        value
            .map(|value| Metric {
                id: key.id,
                value,
            })
            .ok_or_else(|| TallymanError::not_found(kind, id))
    }

    async fn get_all(&self) -> Result<Vec<Metric>> {
        Ok(collect(&self.metrics))
    }

    async fn load(&self, metrics: &[Metric]) -> Result<()> {
        insert_all(&self.metrics, metrics);
        self.schedule_snapshot().await;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, kind: MetricKind, id: &str) -> Result<()> {
        let removed = self.metrics.write().remove(&StorageKey::new(kind, id));
        if removed.is_none() {
            return Err(TallymanError::not_found(kind, id));
        }
        self.schedule_snapshot().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.flush().await
    }
}
