//! Ingestion hot path on the memory backend.
//!
//! Run with: cargo bench --bench ingest

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tallyman_lib::core::Metric;
use tallyman_lib::service::MetricService;
use tallyman_lib::storage::MemoryStorage;

/// Batch of runtime-style metrics with repeated counter keys.
fn generate_batch(size: usize) -> Vec<Metric> {
    (0..size)
        .map(|i| {
            if i % 3 == 0 {
                Metric::counter(format!("counter-{}", i % 10), 1)
            } else {
                Metric::gauge(format!("gauge-{}", i % 100), i as f64)
            }
        })
        .collect()
}

fn bench_save(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service = MetricService::new(Arc::new(MemoryStorage::new()));
    let mut group = c.benchmark_group("save");

    group.bench_function("gauge", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(service.save(Metric::gauge("Alloc", 1.0)).await.unwrap());
        })
    });

    group.bench_function("counter", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(service.save(Metric::counter("PollCount", 1)).await.unwrap());
        })
    });

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service = MetricService::new(Arc::new(MemoryStorage::new()));
    let mut group = c.benchmark_group("load");

    for size in [10, 100, 1_000] {
        let batch = generate_batch(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.to_async(&runtime).iter(|| async {
                service.load(black_box(batch)).await.unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
