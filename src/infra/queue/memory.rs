//! In-memory priority queue.
//!
//! Four FIFO buckets, one per [`Priority`]. Dequeue takes from the most urgent
//! non-empty bucket, which is the same order as inserting each task right
//! before the first queued task of strictly lower priority.

use std::collections::VecDeque;
use std::time::Duration;

use crate::core::{EngineError, ScheduledTask, TaskQueue};
use crate::util::clock::Instant;
use crate::util::serde::Priority;

/// In-memory queue storing scheduled tasks in per-priority FIFO buckets.
/// Enqueue and dequeue are O(1).
pub struct InMemoryQueue<J> {
    pool: String,
    max_depth: usize,
    buckets: [VecDeque<ScheduledTask<J>>; 4],
    len: usize,
}

impl<J> InMemoryQueue<J> {
    /// Create a new queue for `pool` holding at most `max_depth` tasks.
    pub fn new(pool: impl Into<String>, max_depth: usize) -> Self {
        Self {
            pool: pool.into(),
            max_depth,
            buckets: std::array::from_fn(|_| VecDeque::new()),
            len: 0,
        }
    }

    /// Queued tasks per priority, most urgent first.
    #[must_use]
    pub fn len_by_priority(&self) -> [usize; 4] {
        std::array::from_fn(|rank| self.buckets[rank].len())
    }

    /// Priority of the task that would be dequeued next.
    #[must_use]
    pub fn peek_priority(&self) -> Option<Priority> {
        self.buckets
            .iter()
            .position(|b| !b.is_empty())
            .map(|rank| Priority::ALL[rank])
    }
}

impl<J> TaskQueue<J> for InMemoryQueue<J> {
    fn enqueue(&mut self, task: ScheduledTask<J>) -> Result<(), EngineError> {
        if self.len >= self.max_depth {
            return Err(EngineError::QueueFull {
                pool: self.pool.clone(),
                limit: self.max_depth,
            });
        }
        self.buckets[task.meta.priority.rank()].push_back(task);
        self.len += 1;
        Ok(())
    }

    fn dequeue(&mut self) -> Option<ScheduledTask<J>> {
        let task = self.buckets.iter_mut().find_map(VecDeque::pop_front)?;
        self.len -= 1;
        Some(task)
    }

    fn drain_expired(&mut self, now: Instant, max_age: Duration) -> Vec<ScheduledTask<J>> {
        let mut expired = Vec::new();
        for bucket in &mut self.buckets {
            let (stale, fresh): (VecDeque<_>, VecDeque<_>) = bucket
                .drain(..)
                .partition(|t| now.saturating_duration_since(t.meta.enqueued_at) > max_age);
            *bucket = fresh;
            expired.extend(stale);
        }
        self.len -= expired.len();
        expired
    }

    fn drain_all(&mut self) -> Vec<ScheduledTask<J>> {
        self.len = 0;
        self.buckets.iter_mut().flat_map(|b| b.drain(..)).collect()
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.len
    }
}
