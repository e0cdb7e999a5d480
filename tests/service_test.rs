//! Aggregation service behaviour against the storage contract.

mod common;

use common::{fast_retry, sorted, FlakyStorage};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tallyman_lib::core::{Metric, MetricKind, MetricPayload, TallymanError};
use tallyman_lib::service::MetricService;
use tallyman_lib::storage::{MemoryStorage, MetricStorage, RetryingStorage};

fn memory_service() -> MetricService {
    MetricService::new(Arc::new(MemoryStorage::new()))
}

fn payload(kind: &str, id: &str) -> MetricPayload {
    MetricPayload {
        id: id.to_string(),
        kind: kind.to_string(),
        delta: None,
        value: None,
    }
}

#[tokio::test]
async fn test_counter_deltas_accumulate() {
    let service = memory_service();
    service.save(Metric::counter("PollCount", 5)).await.unwrap();
    service.save(Metric::counter("PollCount", -2)).await.unwrap();

    assert_eq!(
        service.get(MetricKind::Counter, "PollCount").await.unwrap(),
        Metric::counter("PollCount", 3)
    );
}

#[tokio::test]
async fn test_gauge_last_write_wins() {
    let service = memory_service();
    service.save(Metric::gauge("Alloc", 1.5)).await.unwrap();
    let stored = service.save(Metric::gauge("Alloc", 0.25)).await.unwrap();

    assert_eq!(stored, Metric::gauge("Alloc", 0.25));
    assert_eq!(service.value(MetricKind::Gauge, "Alloc").await.unwrap(), "0.25");
}

#[tokio::test]
async fn test_batch_collapses_duplicate_keys() {
    let service = memory_service();
    service
        .load(&[Metric::counter("x", 5), Metric::counter("x", 7)])
        .await
        .unwrap();

    assert_eq!(service.get(MetricKind::Counter, "x").await.unwrap(), Metric::counter("x", 12));
}

#[tokio::test]
async fn test_batch_builds_on_stored_totals() {
    let service = memory_service();
    service.save(Metric::counter("x", 10)).await.unwrap();
    service
        .load(&[
            Metric::gauge("g", 1.0),
            Metric::counter("x", 1),
            Metric::gauge("g", 3.0),
            Metric::counter("x", 2),
        ])
        .await
        .unwrap();

    assert_eq!(
        sorted(service.get_all().await.unwrap()),
        vec![Metric::gauge("g", 3.0), Metric::counter("x", 13)]
    );
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let service = memory_service();
    service.load(&[]).await.unwrap();
    assert!(service.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_gauge_and_counter_ids_are_independent() {
    let service = memory_service();
    service.save(Metric::gauge("shared", 2.5)).await.unwrap();
    service.save(Metric::counter("shared", 4)).await.unwrap();

    assert_eq!(service.get(MetricKind::Gauge, "shared").await.unwrap(), Metric::gauge("shared", 2.5));
    assert_eq!(service.get(MetricKind::Counter, "shared").await.unwrap(), Metric::counter("shared", 4));
}

#[tokio::test]
async fn test_missing_key_is_not_found() {
    let service = memory_service();
    let err = service.get(MetricKind::Gauge, "absent").await.unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_validation_errors() {
    assert!(matches!(
        MetricService::validate(&payload("unknown", "a")),
        Err(TallymanError::UnknownKind(ref kind)) if kind == "unknown"
    ));
    assert!(matches!(MetricService::validate(&payload("counter", "")), Err(TallymanError::EmptyId)));
    // empty id wins over an unknown kind
    assert!(matches!(MetricService::validate(&payload("unknown", "")), Err(TallymanError::EmptyId)));
    assert!(matches!(
        MetricService::validate(&payload("gauge", "Alloc")),
        Err(TallymanError::MissingValue { kind: MetricKind::Gauge })
    ));

    let mut counter = payload("counter", "PollCount");
    counter.delta = Some(1);
    assert!(MetricService::validate(&counter).is_ok());
}

#[tokio::test]
async fn test_service_rides_out_transient_failures() {
    let storage = Arc::new(RetryingStorage::new(FlakyStorage::new(2), fast_retry()));
    let service = MetricService::new(Arc::clone(&storage) as Arc<dyn MetricStorage>);

    let stored = service.save(Metric::counter("PollCount", 1)).await.unwrap();

    assert_eq!(stored, Metric::counter("PollCount", 1));
    assert_eq!(storage.retries(), 2);
}

#[tokio::test]
async fn test_ping_is_not_retried() {
    let storage = Arc::new(RetryingStorage::new(FlakyStorage::always_failing(), fast_retry()));
    let service = MetricService::new(Arc::clone(&storage) as Arc<dyn MetricStorage>);

    assert!(service.ping().await.is_err());
    assert_eq!(storage.inner().calls(), 1);
    assert_eq!(storage.retries(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_on_distinct_keys() {
    let service = memory_service();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    service.save(Metric::counter(format!("c{i}"), 1)).await.unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..16 {
        assert_eq!(
            service.get(MetricKind::Counter, &format!("c{i}")).await.unwrap(),
            Metric::counter(format!("c{i}"), 10)
        );
    }
    assert_eq!(service.get_all().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_whole_call_timeout_cancels_retry_loop() {
    let slow = tallyman_lib::core::RetryConfig {
        max_attempts: 3,
        backoff: vec![std::time::Duration::from_secs(60)],
        jitter: false,
    };
    let storage = RetryingStorage::new(FlakyStorage::always_failing(), slow);

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        storage.create(&Metric::gauge("Alloc", 1.0)),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(storage.inner().calls(), 1);
}
