//! Metric aggregation service.
//!
//! The single entry point for ingestion: validates payloads, turns counter
//! deltas into absolute totals and hands finished values to storage. Storage
//! never sums anything itself.

use crate::core::{Metric, MetricKind, MetricPayload, MetricValue, Result, StorageKey, TallymanError};
use crate::storage::MetricStorage;
use ahash::AHashMap;
use std::sync::Arc;

/// Validates, aggregates and persists metrics.
#[derive(Clone)]
pub struct MetricService {
    storage: Arc<dyn MetricStorage>,
}

impl MetricService {
    pub fn new(storage: Arc<dyn MetricStorage>) -> Self {
        Self { storage }
    }

    /// Checks a decoded payload. No side effects.
    pub fn validate(payload: &MetricPayload) -> Result<()> {
        payload.validate()
    }

    /// Stores one metric and returns it as stored.
    ///
    /// A counter's delta is added to the stored total (zero when the key is
    /// new) and the sum is written. Gauges are written unchanged.
    pub async fn save(&self, mut metric: Metric) -> Result<Metric> {
        ensure_id(&metric)?;

        if let MetricValue::Counter(delta) = metric.value {
            let total = self.stored_total(&metric.id).await?;
            metric.value = MetricValue::Counter(add(&metric.id, total, delta)?);
        }

        self.storage.create(&metric).await
    }

    /// Stores a batch with a single bulk write.
    ///
    /// Duplicate keys collapse first: counter deltas are summed and the last
    /// gauge in batch order wins. Keys keep their first-appearance order.
    pub async fn load(&self, metrics: &[Metric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }
        for metric in metrics {
            ensure_id(metric)?;
        }

        let mut merged = aggregate(metrics)?;
        for metric in &mut merged {
            if let MetricValue::Counter(delta) = metric.value {
                let total = self.stored_total(&metric.id).await?;
                metric.value = MetricValue::Counter(add(&metric.id, total, delta)?);
            }
        }

        tracing::debug!(received = metrics.len(), written = merged.len(), "loading metric batch");
        self.storage.load(&merged).await
    }

    /// Current value of a key.
    pub async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric> {
        self.storage.get(kind, id).await
    }

    /// Current value of a key rendered as text.
    pub async fn value(&self, kind: MetricKind, id: &str) -> Result<String> {
        Ok(self.get(kind, id).await?.display_value())
    }

    /// Every stored metric, in no particular order.
    pub async fn get_all(&self) -> Result<Vec<Metric>> {
        self.storage.get_all().await
    }

    /// Backend liveness.
    pub async fn ping(&self) -> Result<()> {
        self.storage.ping().await
    }

    async fn stored_total(&self, id: &str) -> Result<i64> {
        match self.storage.get(MetricKind::Counter, id).await {
            Ok(stored) => Ok(stored.delta().unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }
}

fn ensure_id(metric: &Metric) -> Result<()> {
    if metric.id.is_empty() {
        return Err(TallymanError::EmptyId);
    }
    Ok(())
}

fn add(id: &str, total: i64, delta: i64) -> Result<i64> {
    total
        .checked_add(delta)
        .ok_or_else(|| TallymanError::CounterOverflow { id: id.to_string() })
}

/// Collapses a batch to one metric per key.
fn aggregate(metrics: &[Metric]) -> Result<Vec<Metric>> {
    let mut merged: Vec<Metric> = Vec::with_capacity(metrics.len());
    let mut positions: AHashMap<StorageKey, usize> = AHashMap::with_capacity(metrics.len());

    for metric in metrics {
        let key = metric.key();
        let Some(position) = positions.get(&key).copied() else {
            positions.insert(key, merged.len());
            merged.push(metric.clone());
            continue;
        };

        let slot = &mut merged[position].value;
        *slot = match (*slot, metric.value) {
            (MetricValue::Counter(total), MetricValue::Counter(delta)) => {
                MetricValue::Counter(add(&metric.id, total, delta)?)
            },
            (_, latest) => latest,
        };
    }

    Ok(merged)
}
