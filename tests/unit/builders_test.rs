//! Tests for builder modules

use std::time::Duration;

use docflow_engine::builders::EngineBuilder;
use docflow_engine::config::{PoolOverride, RetryConfig};

#[test]
fn test_engine_builder_accumulates_config() {
    let builder = EngineBuilder::new()
        .with_max_workers(4)
        .with_queue_size(50)
        .with_task_timeout(Duration::from_secs(5))
        .with_retry(RetryConfig {
            base_delay_ms: 10,
            max_delay_ms: 100,
        })
        .with_pool_workers("ai-analysis", 2)
        .with_pool(
            "file-processing",
            PoolOverride {
                queue_size: Some(10),
                ..PoolOverride::default()
            },
        )
        .with_preregistered_pools(["database", "cache"]);

    let cfg = builder.config();
    assert_eq!(cfg.worker_pool.max_workers, 4);
    assert_eq!(cfg.worker_pool.task_timeout, 5_000);
    assert_eq!(cfg.retry.base_delay_ms, 10);
    assert_eq!(cfg.preregistered_pools, vec!["database", "cache"]);
    assert_eq!(cfg.limits_for("ai-analysis").max_workers, 2);
    assert_eq!(cfg.limits_for("ai-analysis").max_queue, 50);
    assert_eq!(cfg.limits_for("file-processing").max_queue, 10);
    assert_eq!(cfg.limits_for("file-processing").max_workers, 4);
}

#[tokio::test]
async fn test_engine_builder_registers_pools() {
    let engine = EngineBuilder::new()
        .with_preregistered_pools(["database", "cache"])
        .build()
        .unwrap();
    let names: Vec<String> = engine
        .statistics()
        .pools
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["cache", "database"]);
}
