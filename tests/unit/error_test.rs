//! Tests for error types

use std::time::Duration;

use docflow_engine::core::{BatchItemError, EngineError};

#[test]
fn test_queue_full_error() {
    let err = EngineError::QueueFull {
        pool: "database".to_string(),
        limit: 1000,
    };
    assert_eq!(format!("{err}"), "queue full for pool `database` (limit 1000)");
    assert!(err.is_admission_rejection());
}

#[test]
fn test_timeout_error() {
    let err = EngineError::Timeout(Duration::from_millis(1500));
    assert_eq!(format!("{err}"), "task timed out after 1500ms");
    assert!(err.is_timeout());
    assert!(!err.is_admission_rejection());
}

#[test]
fn test_retry_exhausted_root() {
    let err = EngineError::RetryExhausted {
        attempts: 3,
        last: Box::new(EngineError::Timeout(Duration::from_secs(2))),
    };
    assert!(err.to_string().starts_with("retries exhausted after 3 attempts"));
    assert!(matches!(err.root(), EngineError::Timeout(_)));
    assert!(err.is_timeout());
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_task_error_keeps_context() {
    let inner = anyhow::anyhow!("disk full").context("writing thumbnail");
    let err = EngineError::from(inner);
    assert_eq!(err.to_string(), "task failed: writing thumbnail: disk full");
}

#[test]
fn test_batch_aggregate_failure() {
    let err = EngineError::BatchAggregateFailure {
        completed: 4,
        failures: vec![BatchItemError {
            index: 2,
            error: EngineError::ShuttingDown,
        }],
    };
    assert_eq!(
        err.to_string(),
        "batch failed: 1 failure(s) after 4 completed item(s)"
    );
}

#[test]
fn test_admission_errors() {
    assert!(EngineError::RateLimitExceeded("api".into()).is_admission_rejection());
    assert!(EngineError::CircuitOpen("db".into()).is_admission_rejection());
    assert!(EngineError::ShuttingDown.is_admission_rejection());
    assert!(!EngineError::Panicked("boom".into()).is_admission_rejection());
}
