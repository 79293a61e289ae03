//! The engine: named pools behind admission control.
//!
//! ```rust,ignore
//! use docflow_engine::core::{task_fn, Engine, SubmitOptions};
//! use docflow_engine::config::EngineConfig;
//! use docflow_engine::util::Priority;
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let handle = engine.submit(
//!     "database",
//!     task_fn(|| async { Ok(load_document(42).await?) }),
//!     SubmitOptions::new()
//!         .with_priority(Priority::High)
//!         .with_retries(2)
//!         .with_circuit_breaker("postgres"),
//! )?;
//! let document = handle.await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::batch::BatchCoalescer;
use crate::core::pool::{Pool, PoolStats, TaskJob, TaskMetadata};
use crate::core::{
    BatchItemError, BreakerStats, CircuitBreakerRegistry, EngineError, LimiterStats,
    RateLimiterRegistry, SharedTask, Task, TaskHandle, WithBreaker, WithRetry, WithTimeout,
};
use crate::util::clock;
use crate::util::serde::Priority;

/// Per-submission options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Queue priority.
    pub priority: Priority,
    /// Per-attempt timeout; the pool default when `None`.
    pub timeout: Option<Duration>,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Route through the batch coalescer instead of the pool queue.
    pub batchable: bool,
    /// Breaker guarding this call.
    pub circuit_breaker: Option<String>,
}

impl SubmitOptions {
    /// Defaults: medium priority, pool timeout, no retries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Mark as batchable.
    ///
    /// Batchable work is only admission-checked: the breaker named by
    /// [`SubmitOptions::with_circuit_breaker`] must be closed and the pool's
    /// rate limiter must admit it. After that it runs once, directly from the
    /// batch coalescer. `timeout` and `retries` are ignored, and its outcome is
    /// not recorded to the breaker.
    #[must_use]
    pub const fn batchable(mut self) -> Self {
        self.batchable = true;
        self
    }

    /// Guard with the named circuit breaker.
    #[must_use]
    pub fn with_circuit_breaker(mut self, name: impl Into<String>) -> Self {
        self.circuit_breaker = Some(name.into());
        self
    }
}

/// Options for [`Engine::submit_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Items submitted per sub-batch; engine default when `None`.
    pub batch_size: Option<usize>,
    /// Pause between sub-batches; engine default when `None`.
    pub delay_between_batches: Option<Duration>,
    /// Abort on the first failure instead of collecting errors.
    pub fail_fast: bool,
    /// Options applied to every item.
    pub task: SubmitOptions,
}

impl BatchOptions {
    /// Isolated-failure mode with engine defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to fail-fast mode.
    #[must_use]
    pub const fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Set the sub-batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the pause between sub-batches.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_between_batches = Some(delay);
        self
    }

    /// Set the options applied to every item.
    #[must_use]
    pub fn with_task_options(mut self, task: SubmitOptions) -> Self {
        self.task = task;
        self
    }
}

/// Result of an isolated-failure batch: a slot per item plus collected errors.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Successful values by submission index; `None` where the item failed.
    pub results: Vec<Option<T>>,
    /// Failures by submission index.
    pub errors: Vec<BatchItemError>,
}

impl<T> BatchOutcome<T> {
    /// Number of successful items.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }
}

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Every pool, sorted by name.
    pub pools: Vec<PoolStats>,
    /// Every breaker, sorted by name.
    pub circuit_breakers: Vec<BreakerStats>,
    /// Every rate limiter, sorted by name.
    pub rate_limiters: Vec<LimiterStats>,
    /// Breakers currently open.
    pub open_circuit_breakers: usize,
    /// Items waiting in batch buffers, per batch name.
    pub pending_batches: Vec<(String, usize)>,
    /// Whether shutdown has begun.
    pub shutting_down: bool,
}

impl EngineStats {
    /// Queued tasks across all pools.
    #[must_use]
    pub fn total_queued(&self) -> usize {
        self.pools.iter().map(|p| p.queue_length).sum()
    }

    /// Active workers across all pools.
    #[must_use]
    pub fn total_active(&self) -> usize {
        self.pools.iter().map(|p| p.active_workers).sum()
    }
}

/// How draining ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// No active or queued work remained.
    Drained,
    /// The shutdown timeout elapsed first.
    TimedOut {
        /// Workers still running at the deadline.
        remaining_active: usize,
    },
}

/// Summary returned by [`Engine::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// How draining ended.
    pub outcome: ShutdownOutcome,
    /// Queued tasks rejected after draining stopped.
    pub abandoned_queued: usize,
    /// Buffered batch items rejected when timers were cancelled.
    pub abandoned_batched: usize,
    /// Time spent.
    pub elapsed: Duration,
}

struct EngineInner {
    config: EngineConfig,
    pools: RwLock<HashMap<String, Arc<Pool>>>,
    breakers: Arc<CircuitBreakerRegistry>,
    limiters: RateLimiterRegistry,
    batches: Arc<BatchCoalescer>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

/// Multi-pool task execution engine.
///
/// Cheap to clone; clones share the same pools and registries. Independent
/// engines share nothing.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine, register the configured pools and start the
    /// maintenance loop.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] when validation fails.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let pools = config
            .preregistered_pools
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Arc::new(Pool::new(name.as_str(), config.limits_for(name))),
                )
            })
            .collect();

        let inner = Arc::new(EngineInner {
            breakers: Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone())),
            limiters: RateLimiterRegistry::new(config.rate_limit.clone()),
            batches: Arc::new(BatchCoalescer::new(Duration::from_millis(
                config.batch.debounce_ms,
            ))),
            pools: RwLock::new(pools),
            next_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
            maintenance: Mutex::new(None),
            config,
        });

        let handle = tokio::spawn(maintenance_loop(
            Arc::downgrade(&inner),
            Duration::from_millis(inner.config.maintenance.sweep_interval_ms),
            Duration::from_millis(inner.config.maintenance.stats_interval_ms),
        ));
        *inner.maintenance.lock() = Some(handle);

        info!(
            pools = ?inner.config.preregistered_pools,
            max_workers = inner.config.worker_pool.max_workers,
            queue_size = inner.config.worker_pool.queue_size,
            "engine started"
        );
        Ok(Self { inner })
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Submit work to `pool`.
    ///
    /// Admission runs in order: shutdown check, circuit breaker, rate limiter.
    /// Batchable work then goes to the batch coalescer; everything else is
    /// wrapped (timeout, retry, breaker) and queued by priority.
    ///
    /// # Errors
    ///
    /// Rejections are synchronous and the work is never invoked:
    /// [`EngineError::ShuttingDown`], [`EngineError::CircuitOpen`],
    /// [`EngineError::RateLimitExceeded`] or [`EngineError::QueueFull`].
    pub fn submit<T, W>(
        &self,
        pool: &str,
        work: W,
        options: SubmitOptions,
    ) -> Result<TaskHandle<T>, EngineError>
    where
        T: Send + 'static,
        W: Task<T>,
    {
        self.submit_shared(pool, Arc::new(work), options)
    }

    fn submit_shared<T>(
        &self,
        pool_name: &str,
        work: SharedTask<T>,
        options: SubmitOptions,
    ) -> Result<TaskHandle<T>, EngineError>
    where
        T: Send + 'static,
    {
        let inner = &self.inner;
        if inner.shutting_down.load(Ordering::Acquire) {
            return Err(EngineError::ShuttingDown);
        }
        if let Some(breaker) = options.circuit_breaker.as_deref() {
            if inner.breakers.is_open(breaker) {
                debug!(pool = pool_name, breaker, "rejected: circuit open");
                return Err(EngineError::CircuitOpen(breaker.to_string()));
            }
        }
        if inner.limiters.try_acquire(pool_name).is_none() {
            return Err(EngineError::RateLimitExceeded(pool_name.to_string()));
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        if options.batchable {
            inner
                .batches
                .add(pool_name, Box::new(TaskJob::new(work, tx)));
            return Ok(TaskHandle::new(id, rx));
        }

        let pool = inner.pool(pool_name);
        let timeout = options.timeout.unwrap_or(pool.limits().default_timeout);
        let mut task: SharedTask<T> = Arc::new(WithTimeout::new(work, timeout));
        task = Arc::new(WithRetry::new(
            task,
            options.retries,
            inner.config.retry.clone(),
        ));
        if let Some(breaker) = options.circuit_breaker {
            task = Arc::new(WithBreaker::new(task, breaker, Arc::clone(&inner.breakers)));
        }

        let meta = TaskMetadata {
            id,
            priority: options.priority,
            enqueued_at: clock::now(),
        };
        pool.enqueue(meta, Box::new(TaskJob::new(task, tx)))?;
        Ok(TaskHandle::new(id, rx))
    }

    /// Submit many items in sub-batches, pausing between sub-batches.
    ///
    /// In isolated mode every item is attempted and failures are collected in
    /// [`BatchOutcome::errors`]. In fail-fast mode the first failure ends the
    /// call; items already started keep running but their results are
    /// discarded, and later sub-batches are never submitted.
    ///
    /// # Errors
    ///
    /// Only in fail-fast mode: [`EngineError::BatchAggregateFailure`].
    pub async fn submit_batch<T, W>(
        &self,
        pool: &str,
        items: Vec<W>,
        options: BatchOptions,
    ) -> Result<BatchOutcome<T>, EngineError>
    where
        T: Send + 'static,
        W: Task<T>,
    {
        let batch_size = options
            .batch_size
            .unwrap_or(self.inner.config.batch.batch_size)
            .max(1);
        let pause = options.delay_between_batches.unwrap_or(Duration::from_millis(
            self.inner.config.batch.delay_between_batches_ms,
        ));

        let mut results: Vec<Option<T>> =
            std::iter::repeat_with(|| None).take(items.len()).collect();
        let mut errors = Vec::new();
        let mut completed = 0;
        let mut remaining = items.into_iter().enumerate().peekable();
        let mut first = true;

        while remaining.peek().is_some() {
            if !first && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            first = false;

            let mut pending = FuturesUnordered::new();
            for (index, work) in remaining.by_ref().take(batch_size) {
                match self.submit(pool, work, options.task.clone()) {
                    Ok(handle) => pending.push(async move { (index, handle.await) }),
                    Err(error) if options.fail_fast => {
                        return Err(aggregate_failure(completed, index, error));
                    }
                    Err(error) => errors.push(BatchItemError { index, error }),
                }
            }

            while let Some((index, outcome)) = pending.next().await {
                match outcome {
                    Ok(value) => {
                        results[index] = Some(value);
                        completed += 1;
                    }
                    Err(error) if options.fail_fast => {
                        return Err(aggregate_failure(completed, index, error));
                    }
                    Err(error) => errors.push(BatchItemError { index, error }),
                }
            }
        }

        errors.sort_by_key(|e| e.index);
        if !errors.is_empty() {
            warn!(pool, failed = errors.len(), completed, "batch finished with failures");
        }
        Ok(BatchOutcome { results, errors })
    }

    /// Snapshot of pools, breakers and limiters. Reads only: calling it never
    /// changes engine state.
    #[must_use]
    pub fn statistics(&self) -> EngineStats {
        self.inner.statistics()
    }

    /// Evict queued tasks older than the configured maximum age, rejecting
    /// them with [`EngineError::Expired`]. The maintenance loop calls this
    /// periodically. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Stop accepting work, cancel batch timers, then wait for active and
    /// queued work to drain up to the configured timeout. Whatever is still
    /// queued afterwards is rejected with [`EngineError::ShuttingDown`].
    pub async fn shutdown(&self) -> ShutdownReport {
        let inner = &self.inner;
        let started = clock::now();
        if inner.shutting_down.swap(true, Ordering::AcqRel) {
            debug!("shutdown already in progress");
        }
        info!("engine shutting down");

        if let Some(handle) = inner.maintenance.lock().take() {
            handle.abort();
        }
        let abandoned_batched = inner.batches.cancel_all();

        let timeout = Duration::from_millis(inner.config.shutdown.timeout_ms);
        let poll = Duration::from_millis(inner.config.shutdown.poll_interval_ms);
        let deadline = started + timeout;
        let outcome = loop {
            let (active, queued) = inner.load();
            if active == 0 && queued == 0 {
                break ShutdownOutcome::Drained;
            }
            if clock::now() >= deadline {
                break ShutdownOutcome::TimedOut {
                    remaining_active: active,
                };
            }
            debug!(active, queued, "waiting for work to drain");
            tokio::time::sleep(poll).await;
        };

        let abandoned_queued: usize = inner
            .pools_snapshot()
            .iter()
            .map(|pool| pool.abandon_queued())
            .sum();

        let report = ShutdownReport {
            outcome,
            abandoned_queued,
            abandoned_batched,
            elapsed: clock::now().saturating_duration_since(started),
        };
        match report.outcome {
            ShutdownOutcome::Drained => info!(
                abandoned_batched,
                elapsed_ms = report.elapsed.as_millis(),
                "engine shut down cleanly"
            ),
            ShutdownOutcome::TimedOut { remaining_active } => warn!(
                remaining_active,
                abandoned_queued,
                abandoned_batched,
                "engine shutdown timed out"
            ),
        }
        report
    }
}

impl EngineInner {
    /// Look up a pool, creating it with configured limits on first use.
    fn pool(&self, name: &str) -> Arc<Pool> {
        if let Some(pool) = self.pools.read().get(name) {
            return Arc::clone(pool);
        }
        let mut pools = self.pools.write();
        let pool = pools.entry(name.to_string()).or_insert_with(|| {
            debug!(pool = name, "creating pool");
            Arc::new(Pool::new(name, self.config.limits_for(name)))
        });
        Arc::clone(pool)
    }

    fn pools_snapshot(&self) -> Vec<Arc<Pool>> {
        self.pools.read().values().cloned().collect()
    }

    /// Total (active, queued) across pools.
    fn load(&self) -> (usize, usize) {
        self.pools_snapshot()
            .iter()
            .fold((0, 0), |(active, queued), pool| {
                (active + pool.active_workers(), queued + pool.queue_length())
            })
    }

    fn sweep_expired(&self) -> usize {
        let max_age = Duration::from_millis(self.config.maintenance.max_queued_age_ms);
        let removed: usize = self
            .pools_snapshot()
            .iter()
            .map(|pool| pool.sweep_expired(max_age))
            .sum();
        if removed > 0 {
            info!(removed, "maintenance sweep expired queued tasks");
        }
        removed
    }

    fn statistics(&self) -> EngineStats {
        let mut pools: Vec<_> = self.pools_snapshot().iter().map(|p| p.stats()).collect();
        pools.sort_by(|a, b| a.name.cmp(&b.name));
        EngineStats {
            pools,
            circuit_breakers: self.breakers.stats(),
            rate_limiters: self.limiters.stats(),
            open_circuit_breakers: self.breakers.open_count(),
            pending_batches: self.batches.pending(),
            shutting_down: self.shutting_down.load(Ordering::Acquire),
        }
    }

    fn log_statistics(&self) {
        let stats = self.statistics();
        info!(
            pools = stats.pools.len(),
            queued = stats.total_queued(),
            active = stats.total_active(),
            open_breakers = stats.open_circuit_breakers,
            "engine statistics"
        );
        for pool in &stats.pools {
            debug!(
                pool = %pool.name,
                queued = pool.queue_length,
                active = pool.active_workers,
                completed = pool.completed_tasks,
                failed = pool.failed_tasks,
                "pool statistics"
            );
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.get_mut().take() {
            handle.abort();
        }
    }
}

fn aggregate_failure(completed: usize, index: usize, error: EngineError) -> EngineError {
    warn!(index, error = %error, "batch aborted on first failure");
    EngineError::BatchAggregateFailure {
        completed,
        failures: vec![BatchItemError { index, error }],
    }
}

/// Periodic expiry sweep and statistics logging. Ends once the engine is
/// dropped.
async fn maintenance_loop(inner: Weak<EngineInner>, sweep_every: Duration, stats_every: Duration) {
    let start = tokio::time::Instant::now();
    let mut sweep = tokio::time::interval_at(start + sweep_every, sweep_every);
    let mut stats = tokio::time::interval_at(start + stats_every, stats_every);
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.sweep_expired();
            }
            _ = stats.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.log_statistics();
            }
        }
    }
    debug!("maintenance loop stopped");
}
