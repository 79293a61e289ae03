//! Tests for utility functions

use docflow_engine::util::{now, now_ms, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!(Priority::default(), Priority::Medium);
}

#[test]
fn test_priority_ranks_follow_importance() {
    let mut sorted = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
    sorted.sort_by_key(|p| p.rank());
    assert_eq!(sorted, Priority::ALL.to_vec());
}

#[test]
fn test_task_id() {
    let id: TaskId = 12345;
    assert_eq!(id, 12345);
}

#[tokio::test(start_paused = true)]
async fn test_clock_follows_paused_time() {
    let start = now();
    let start_ms = now_ms();
    tokio::time::advance(std::time::Duration::from_millis(250)).await;
    assert_eq!(start.elapsed().as_millis(), 250);
    assert!(now_ms() >= start_ms);
}

#[test]
fn test_init_tracing_is_idempotent() {
    docflow_engine::util::init_tracing();
    docflow_engine::util::init_tracing();
    tracing::info!(pool = "cache", "tracing initialised");
}
