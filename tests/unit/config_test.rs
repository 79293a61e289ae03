//! Tests for configuration validation

use docflow_engine::config::{EngineConfig, PoolOverride, DEFAULT_POOLS};

#[test]
fn test_default_config_is_valid() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.worker_pool.queue_size, 1000);
    assert_eq!(cfg.preregistered_pools, DEFAULT_POOLS.to_vec());
}

#[test]
fn test_invalid_max_workers() {
    let mut cfg = EngineConfig::default();
    cfg.worker_pool.max_workers = 0;
    assert!(cfg.validate().unwrap_err().contains("maxWorkers"));
}

#[test]
fn test_invalid_pool_override() {
    let mut cfg = EngineConfig::default();
    cfg.pools.insert(
        "cache".into(),
        PoolOverride {
            queue_size: Some(0),
            ..PoolOverride::default()
        },
    );
    assert!(cfg.validate().unwrap_err().contains("cache"));
}

#[test]
fn test_json_config_uses_camel_case_and_defaults() {
    let cfg = EngineConfig::from_json_str(
        r#"{
            "workerPool": { "maxWorkers": 3, "taskTimeout": 5000 },
            "rateLimit": { "maxRequests": 10, "burstLimit": 0 },
            "pools": { "ai-analysis": { "maxWorkers": 1 } }
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.worker_pool.max_workers, 3);
    assert_eq!(cfg.worker_pool.queue_size, 1000);
    assert_eq!(cfg.rate_limit.max_requests, 10);
    assert_eq!(cfg.rate_limit.window_ms, 60_000);
    assert_eq!(cfg.rate_limit.burst_limit, 0);
    assert_eq!(cfg.limits_for("ai-analysis").max_workers, 1);
    assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
}

#[test]
fn test_json_config_rejects_invalid_values() {
    let err = EngineConfig::from_json_str(r#"{ "batch": { "batchSize": 0 } }"#).unwrap_err();
    assert!(err.contains("batchSize"));
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_round_trips_through_json() {
    let cfg = EngineConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"failureThreshold\":5"));
    let back = EngineConfig::from_json_str(&json).unwrap();
    assert_eq!(back, cfg);
}
