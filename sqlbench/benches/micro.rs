//! Criterion microbenchmarks for the statistics reducer, the worker pool and
//! the SQLite execute path.
//!
//! Run with: `cargo bench --bench micro`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use sqlbench::adapters::sqlite_adapter::SqliteAdapter;
use sqlbench::{AtMost, Database, Durations, QueryExecutor, Value};

/// Latencies around 5ms with a 1ms spread, clamped at zero.
fn latency_samples(n: usize) -> Durations {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let normal = Normal::new(5_000_000.0, 1_000_000.0).unwrap();
    (0..n)
        .map(|_| Duration::from_nanos(normal.sample(&mut rng).max(0.0) as u64))
        .collect()
}

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");

    for n in [1_000usize, 100_000] {
        let samples = latency_samples(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("median", n), &samples, |b, s| {
            b.iter(|| s.median())
        });
        group.bench_with_input(BenchmarkId::new("distribute", n), &samples, |b, s| {
            b.iter(|| s.distribute(4))
        });
    }
    group.finish();
}

fn bench_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter");
    let tasks = 10_000usize;
    group.throughput(Throughput::Elements(tasks as u64));

    for limit in [1usize, 8] {
        group.bench_function(BenchmarkId::new("noop_tasks", limit), |b| {
            let pool = AtMost::new(limit).unwrap();
            let done = Arc::new(AtomicUsize::new(0));
            b.iter(|| {
                for _ in 0..tasks {
                    let done = done.clone();
                    pool.submit(move || {
                        done.fetch_add(1, Ordering::Relaxed);
                    })
                    .unwrap();
                }
                pool.wait();
            });
        });
    }
    group.finish();
}

fn bench_sqlite_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_execute");

    let db = SqliteAdapter::open(":memory:", 1).unwrap();
    db.execute_batch(
        "CREATE TABLE cpu_usage (host TEXT, ts INTEGER, usage REAL);
         CREATE INDEX cpu_usage_host_ts ON cpu_usage (host, ts);",
    )
    .unwrap();
    let rows: Vec<Vec<Value>> = (0..10_000i64)
        .map(|i| {
            vec![
                Value::from(format!("host_{}", i % 10)),
                Value::from(i),
                Value::from((i % 100) as f64 / 100.0),
            ]
        })
        .collect();
    let columns = ["host", "ts", "usage"].map(String::from);
    db.bulk_insert("cpu_usage", &columns, &rows).unwrap();

    let query = "SELECT * FROM cpu_usage WHERE host = ? AND ts >= ? AND ts <= ?";
    let params = [Value::from("host_3"), Value::from(1_000i64), Value::from(2_000i64)];

    group.bench_function("indexed_range", |b| {
        b.iter(|| db.execute(query, &params).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_stats, bench_limiter, bench_sqlite_execute);
criterion_main!(benches);
