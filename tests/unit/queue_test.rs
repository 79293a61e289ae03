//! Tests for the in-memory priority queue

use std::time::Duration;

use docflow_engine::core::{EngineError, ScheduledTask, TaskMetadata, TaskQueue};
use docflow_engine::infra::InMemoryQueue;
use docflow_engine::util::{now, Priority};

fn task(id: u64, priority: Priority) -> ScheduledTask<&'static str> {
    ScheduledTask {
        meta: TaskMetadata {
            id,
            priority,
            enqueued_at: now(),
        },
        payload: "payload",
    }
}

#[tokio::test]
async fn test_dequeue_by_priority_then_fifo() {
    let mut queue = InMemoryQueue::new("pool", 10);
    queue.enqueue(task(1, Priority::Low)).unwrap();
    queue.enqueue(task(2, Priority::High)).unwrap();
    queue.enqueue(task(3, Priority::Medium)).unwrap();
    queue.enqueue(task(4, Priority::High)).unwrap();
    queue.enqueue(task(5, Priority::Critical)).unwrap();

    assert_eq!(queue.len_by_priority(), [1, 2, 1, 1]);
    assert_eq!(queue.peek_priority(), Some(Priority::Critical));
    let order: Vec<u64> = std::iter::from_fn(|| queue.dequeue().map(|t| t.meta.id)).collect();
    assert_eq!(order, vec![5, 2, 4, 3, 1]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_enqueue_respects_max_depth() {
    let mut queue = InMemoryQueue::new("pool", 1);
    queue.enqueue(task(1, Priority::Low)).unwrap();
    let err = queue.enqueue(task(2, Priority::Critical)).unwrap_err();
    assert!(matches!(err, EngineError::QueueFull { limit: 1, .. }));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.max_depth(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drain_expired_keeps_fresh_tasks() {
    let mut queue = InMemoryQueue::new("pool", 10);
    queue.enqueue(task(1, Priority::High)).unwrap();
    tokio::time::advance(Duration::from_millis(600)).await;
    queue.enqueue(task(2, Priority::High)).unwrap();
    tokio::time::advance(Duration::from_millis(600)).await;

    let expired = queue.drain_expired(now(), Duration::from_millis(1000));
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].meta.id, 1);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.drain_all().len(), 1);
    assert!(queue.is_empty());
}
