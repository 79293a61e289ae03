//! Pool scheduler: priority queue plus a bounded set of active workers.
//!
//! A "worker" is a logical slot, not a thread. Each started task runs on its
//! own Tokio task while it occupies a slot; the slot is released when the task
//! settles and the next queued task is dispatched.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{EngineError, SharedTask};
use crate::infra::InMemoryQueue;
use crate::util::clock::{self, Instant};
use crate::util::serde::{Priority, TaskId};

/// Capacity limits of one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLimits {
    /// Maximum concurrently active workers.
    pub max_workers: usize,
    /// Maximum queued tasks.
    pub max_queue: usize,
    /// Default per-attempt timeout for tasks submitted without one.
    pub default_timeout: Duration,
}

/// Metadata describing a queued task.
#[derive(Debug, Clone)]
pub struct TaskMetadata {
    /// Unique task identifier.
    pub id: TaskId,
    /// Priority used for queue ordering.
    pub priority: Priority,
    /// When the task entered the queue; drives expiry.
    pub enqueued_at: Instant,
}

/// A schedulable task with metadata and payload.
#[derive(Debug)]
pub struct ScheduledTask<J> {
    /// Metadata driving scheduling decisions.
    pub meta: TaskMetadata,
    /// Work supplied by the caller.
    pub payload: J,
}

/// Abstraction for queue backends.
pub trait TaskQueue<J> {
    /// Enqueue a task if space permits.
    ///
    /// # Errors
    ///
    /// [`EngineError::QueueFull`] when the queue is at `max_depth`.
    fn enqueue(&mut self, task: ScheduledTask<J>) -> Result<(), EngineError>;
    /// Dequeue the next task: highest priority first, FIFO within a priority.
    fn dequeue(&mut self) -> Option<ScheduledTask<J>>;
    /// Remove and return tasks that waited longer than `max_age`.
    fn drain_expired(&mut self, now: Instant, max_age: Duration) -> Vec<ScheduledTask<J>>;
    /// Remove and return every queued task.
    fn drain_all(&mut self) -> Vec<ScheduledTask<J>>;
    /// Maximum depth allowed for this queue.
    fn max_depth(&self) -> usize;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type-erased queued work: runs once, or is rejected without running.
pub(crate) trait Job: Send {
    /// Run to completion, settling the caller's handle. Returns `true` on success.
    fn run(self: Box<Self>) -> BoxFuture<'static, bool>;
    /// Settle the caller's handle with `err` without running.
    fn reject(self: Box<Self>, err: EngineError);
}

pub(crate) type BoxJob = Box<dyn Job>;

/// A [`SharedTask`] bound to the sender half of its caller's handle.
pub(crate) struct TaskJob<T> {
    task: SharedTask<T>,
    tx: oneshot::Sender<Result<T, EngineError>>,
}

impl<T: Send + 'static> TaskJob<T> {
    pub(crate) fn new(task: SharedTask<T>, tx: oneshot::Sender<Result<T, EngineError>>) -> Self {
        Self { task, tx }
    }
}

impl<T: Send + 'static> Job for TaskJob<T> {
    fn run(self: Box<Self>) -> BoxFuture<'static, bool> {
        let Self { task, tx } = *self;
        Box::pin(async move {
            let result = match AssertUnwindSafe(task.run()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(EngineError::Panicked(panic_message(panic.as_ref()))),
            };
            let ok = result.is_ok();
            // The caller may have dropped its handle; the outcome is still counted.
            let _ = tx.send(result);
            ok
        })
    }

    fn reject(self: Box<Self>, err: EngineError) {
        let _ = self.tx.send(Err(err));
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

/// Statistics about one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool name.
    pub name: String,
    /// Tasks waiting in the queue.
    pub queue_length: usize,
    /// Queued tasks per priority, most urgent first.
    pub queued_by_priority: [usize; 4],
    /// Currently occupied worker slots.
    pub active_workers: usize,
    /// Worker ceiling.
    pub max_workers: usize,
    /// Queue ceiling.
    pub max_queue: usize,
    /// Highest number of simultaneously active workers observed.
    pub peak_active_workers: usize,
    /// Tasks accepted into the queue.
    pub submitted_tasks: u64,
    /// Tasks that settled successfully.
    pub completed_tasks: u64,
    /// Tasks that settled with an error.
    pub failed_tasks: u64,
    /// Submissions rejected because the queue was full.
    pub rejected_tasks: u64,
    /// Tasks evicted by the maintenance sweep.
    pub expired_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
    pub expired: AtomicU64,
    pub peak_active: AtomicUsize,
}

struct PoolState {
    queue: InMemoryQueue<BoxJob>,
    active: HashSet<Uuid>,
}

/// One named pool. Its queue and active set share a single lock so pools
/// never contend with each other.
pub(crate) struct Pool {
    name: String,
    limits: PoolLimits,
    state: Mutex<PoolState>,
    counters: PoolCounters,
}

impl Pool {
    pub(crate) fn new(name: impl Into<String>, limits: PoolLimits) -> Self {
        let name = name.into();
        Self {
            state: Mutex::new(PoolState {
                queue: InMemoryQueue::new(name.clone(), limits.max_queue),
                active: HashSet::with_capacity(limits.max_workers),
            }),
            name,
            limits,
            counters: PoolCounters::default(),
        }
    }

    pub(crate) const fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    /// Queue a job and schedule a dispatch pass.
    ///
    /// Rejection is synchronous: a job that does not fit is returned to the
    /// caller as an error and never enters the queue.
    pub(crate) fn enqueue(
        self: &Arc<Self>,
        meta: TaskMetadata,
        job: BoxJob,
    ) -> Result<(), EngineError> {
        let task_id = meta.id;
        let queued = self
            .state
            .lock()
            .queue
            .enqueue(ScheduledTask { meta, payload: job });
        if let Err(err) = queued {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(pool = %self.name, task_id, "task rejected: queue full");
            return Err(err);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(pool = %self.name, task_id, "task enqueued");
        self.schedule_dispatch();
        Ok(())
    }

    /// Run a dispatch pass on a fresh Tokio task, so submissions made in the
    /// same turn are all queued (and priority-ordered) before any starts.
    fn schedule_dispatch(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move { pool.dispatch() });
    }

    /// Move queued jobs into free worker slots.
    fn dispatch(self: &Arc<Self>) {
        loop {
            let (worker_id, task) = {
                let mut state = self.state.lock();
                if state.active.len() >= self.limits.max_workers {
                    return;
                }
                let Some(task) = state.queue.dequeue() else {
                    return;
                };
                let worker_id = Uuid::new_v4();
                state.active.insert(worker_id);
                self.counters
                    .peak_active
                    .fetch_max(state.active.len(), Ordering::Relaxed);
                (worker_id, task)
            };

            debug!(
                pool = %self.name,
                task_id = task.meta.id,
                priority = ?task.meta.priority,
                %worker_id,
                "task started"
            );
            let pool = Arc::clone(self);
            let task_id = task.meta.id;
            tokio::spawn(async move {
                let ok = task.payload.run().await;
                pool.finish(worker_id, task_id, ok);
            });
        }
    }

    fn finish(self: &Arc<Self>, worker_id: Uuid, task_id: TaskId, ok: bool) {
        let more = {
            let mut state = self.state.lock();
            state.active.remove(&worker_id);
            !state.queue.is_empty()
        };
        if ok {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(pool = %self.name, task_id, ok, "task settled");
        if more {
            self.schedule_dispatch();
        }
    }

    /// Reject queued jobs older than `max_age` with [`EngineError::Expired`].
    pub(crate) fn sweep_expired(&self, max_age: Duration) -> usize {
        let now = clock::now();
        let expired = self.state.lock().queue.drain_expired(now, max_age);
        let count = expired.len();
        for task in expired {
            let waited = now.saturating_duration_since(task.meta.enqueued_at);
            task.payload.reject(EngineError::Expired {
                pool: self.name.clone(),
                waited,
            });
        }
        if count > 0 {
            self.counters.expired.fetch_add(count as u64, Ordering::Relaxed);
            info!(pool = %self.name, removed = count, "expired stale queued tasks");
        }
        count
    }

    /// Reject everything still queued with [`EngineError::ShuttingDown`].
    pub(crate) fn abandon_queued(&self) -> usize {
        let abandoned = self.state.lock().queue.drain_all();
        let count = abandoned.len();
        for task in abandoned {
            task.payload.reject(EngineError::ShuttingDown);
        }
        count
    }

    pub(crate) fn active_workers(&self) -> usize {
        self.state.lock().active.len()
    }

    pub(crate) fn queue_length(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Snapshot of this pool. Reads only.
    pub(crate) fn stats(&self) -> PoolStats {
        let (queue_length, queued_by_priority, active_workers) = {
            let state = self.state.lock();
            (
                state.queue.len(),
                state.queue.len_by_priority(),
                state.active.len(),
            )
        };
        PoolStats {
            name: self.name.clone(),
            queue_length,
            queued_by_priority,
            active_workers,
            max_workers: self.limits.max_workers,
            max_queue: self.limits.max_queue,
            peak_active_workers: self.counters.peak_active.load(Ordering::Relaxed),
            submitted_tasks: self.counters.submitted.load(Ordering::Relaxed),
            completed_tasks: self.counters.completed.load(Ordering::Relaxed),
            failed_tasks: self.counters.failed.load(Ordering::Relaxed),
            rejected_tasks: self.counters.rejected.load(Ordering::Relaxed),
            expired_tasks: self.counters.expired.load(Ordering::Relaxed),
        }
    }
}
