//! Benchmarks for the engine scheduler.
//!
//! Benchmarks cover:
//! - Queue operations (enqueue/dequeue across priorities, expiry sweeps)
//! - Admission control (rate limiter, circuit breaker checks)
//! - End-to-end submission through a pool

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use docflow_engine::builders::EngineBuilder;
use docflow_engine::config::{CircuitBreakerConfig, RateLimitConfig};
use docflow_engine::core::{
    task_fn, CircuitBreakerRegistry, Engine, RateLimiterRegistry, ScheduledTask, SubmitOptions,
    TaskMetadata, TaskQueue,
};
use docflow_engine::infra::InMemoryQueue;
use docflow_engine::util::{now, Priority};

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn build_task(id: u64, priority: Priority) -> ScheduledTask<String> {
    ScheduledTask {
        meta: TaskMetadata {
            id,
            priority,
            enqueued_at: now(),
        },
        payload: format!("payload-{id}"),
    }
}

fn mixed_priority(i: u64) -> Priority {
    match i % 4 {
        0 => Priority::Critical,
        1 => Priority::High,
        2 => Priority::Medium,
        _ => Priority::Low,
    }
}

fn bench_engine(rt: &Runtime, workers: usize) -> Engine {
    let _guard = rt.enter();
    EngineBuilder::new()
        .with_max_workers(workers)
        .with_queue_size(100_000)
        .with_rate_limit(RateLimitConfig {
            max_requests: usize::MAX,
            window_ms: 1,
            burst_limit: 0,
        })
        .build()
        .unwrap()
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_enqueue_dequeue(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let mut group = c.benchmark_group("queue_enqueue_dequeue");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = InMemoryQueue::new("bench", size as usize);
                for i in 0..size {
                    q.enqueue(build_task(i, mixed_priority(i))).unwrap();
                }
                while let Some(task) = q.dequeue() {
                    black_box(task);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_drain_expired(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let mut group = c.benchmark_group("queue_drain_expired");

    for size in [100, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = InMemoryQueue::new("bench", size as usize);
                for i in 0..size {
                    q.enqueue(build_task(i, mixed_priority(i))).unwrap();
                }
                // Everything is younger than the max age; measures the scan.
                let expired = q.drain_expired(now(), Duration::from_secs(60));
                black_box(expired);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Admission Benchmarks
// ============================================================================

fn bench_admission_checks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let mut group = c.benchmark_group("admission");

    let limiter = RateLimiterRegistry::new(RateLimitConfig {
        max_requests: usize::MAX,
        window_ms: 1,
        burst_limit: 0,
    });
    group.bench_function("rate_limiter_try_acquire", |b| {
        b.iter(|| black_box(limiter.try_acquire("database")));
    });

    let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
    group.bench_function("circuit_breaker_is_open", |b| {
        b.iter(|| black_box(breakers.is_open("postgres")));
    });
    group.finish();
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn bench_engine_submit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("engine_submit");

    for count in [10u64, 100, 1_000] {
        let engine = bench_engine(&rt, 8);
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async {
                let handles: Vec<_> = (0..count)
                    .map(|i| {
                        engine
                            .submit(
                                "database",
                                task_fn(move || async move { Ok(i) }),
                                SubmitOptions::new().with_priority(mixed_priority(i)),
                            )
                            .unwrap()
                    })
                    .collect();
                for handle in handles {
                    black_box(handle.await.unwrap());
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    queue_benches,
    bench_queue_enqueue_dequeue,
    bench_queue_drain_expired
);

criterion_group!(admission_benches, bench_admission_checks);

criterion_group!(engine_benches, bench_engine_submit);

criterion_main!(queue_benches, admission_benches, engine_benches);
