//! Engine configuration structures.
//!
//! Field names serialize in camelCase so JSON documents use the same keys the
//! platform's services already configure (`workerPool.maxWorkers`,
//! `rateLimit.burstLimit`, ...). Durations are plain milliseconds.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::PoolLimits;

/// Pools registered when the engine starts.
pub const DEFAULT_POOLS: [&str; 4] = ["database", "ai-analysis", "file-processing", "cache"];

/// Default per-pool worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerPoolConfig {
    /// Maximum concurrently active workers per pool.
    pub max_workers: usize,
    /// Maximum queued tasks per pool before rejection.
    pub queue_size: usize,
    /// Default per-attempt timeout in milliseconds.
    pub task_timeout: u64,
    /// Reserved; not used by the scheduler.
    pub idle_timeout: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            queue_size: 1000,
            task_timeout: 30_000,
            idle_timeout: 60_000,
        }
    }
}

impl WorkerPoolConfig {
    /// Create the default worker settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker ceiling.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the queue length ceiling.
    #[must_use]
    pub const fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set the default task timeout.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = duration_ms(timeout);
        self
    }
}

/// Circuit breaker thresholds, shared by every named breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a breaker.
    pub failure_threshold: u32,
    /// How long an open breaker stays open, in milliseconds.
    pub reset_timeout: u64,
    /// Declared for compatibility; failure counts do not decay over it.
    pub monitor_window: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: 60_000,
            monitor_window: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Reset timeout as a [`Duration`].
    #[must_use]
    pub const fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout)
    }
}

/// Per-pool admission limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    /// Requests admitted per window without spending burst tokens.
    pub max_requests: usize,
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
    /// Burst token capacity; refills one token per second.
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
            burst_limit: 20,
        }
    }
}

impl RateLimitConfig {
    /// Window as a [`Duration`].
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Backoff applied between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Delay before the second attempt; doubles per attempt.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Batch coalescing and `submit_batch` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Debounce window of the batch coalescer.
    pub debounce_ms: u64,
    /// Default sub-batch size for `submit_batch`.
    pub batch_size: usize,
    /// Default pause between sub-batches.
    pub delay_between_batches_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            batch_size: 10,
            delay_between_batches_ms: 100,
        }
    }
}

/// Background maintenance cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceConfig {
    /// How often queued work is swept for expiry.
    pub sweep_interval_ms: u64,
    /// How often aggregate statistics are logged.
    pub stats_interval_ms: u64,
    /// Queued work older than this is expired.
    pub max_queued_age_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 60_000,
            stats_interval_ms: 300_000,
            max_queued_age_ms: 300_000,
        }
    }
}

/// Graceful shutdown bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShutdownConfig {
    /// Hard limit on draining.
    pub timeout_ms: u64,
    /// Interval between drain checks.
    pub poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

/// Per-pool overrides of [`WorkerPoolConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolOverride {
    /// Worker ceiling for this pool.
    pub max_workers: Option<usize>,
    /// Queue ceiling for this pool.
    pub queue_size: Option<usize>,
    /// Default timeout for this pool, in milliseconds.
    pub task_timeout: Option<u64>,
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Default worker settings for every pool.
    pub worker_pool: WorkerPoolConfig,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Rate limiter settings, applied per pool.
    pub rate_limit: RateLimitConfig,
    /// Retry backoff.
    pub retry: RetryConfig,
    /// Batch settings.
    pub batch: BatchConfig,
    /// Maintenance cadence.
    pub maintenance: MaintenanceConfig,
    /// Shutdown bounds.
    pub shutdown: ShutdownConfig,
    /// Overrides keyed by pool name.
    pub pools: HashMap<String, PoolOverride>,
    /// Pools created at startup.
    pub preregistered_pools: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool: WorkerPoolConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            maintenance: MaintenanceConfig::default(),
            shutdown: ShutdownConfig::default(),
            pools: HashMap::new(),
            preregistered_pools: DEFAULT_POOLS.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Validate all values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        let wp = &self.worker_pool;
        if wp.max_workers == 0 {
            return Err("workerPool.maxWorkers must be greater than 0".into());
        }
        if wp.queue_size == 0 {
            return Err("workerPool.queueSize must be greater than 0".into());
        }
        if wp.task_timeout == 0 {
            return Err("workerPool.taskTimeout must be greater than 0".into());
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err("circuitBreaker.failureThreshold must be greater than 0".into());
        }
        if self.rate_limit.window_ms == 0 {
            return Err("rateLimit.windowMs must be greater than 0".into());
        }
        if self.batch.batch_size == 0 {
            return Err("batch.batchSize must be greater than 0".into());
        }
        if self.maintenance.sweep_interval_ms == 0 || self.maintenance.stats_interval_ms == 0 {
            return Err("maintenance intervals must be greater than 0".into());
        }
        if self.shutdown.poll_interval_ms == 0 {
            return Err("shutdown.pollIntervalMs must be greater than 0".into());
        }
        for (name, pool) in &self.pools {
            if pool.max_workers == Some(0) || pool.queue_size == Some(0) {
                return Err(format!("pool `{name}` invalid: limits must be greater than 0"));
            }
            if pool.task_timeout == Some(0) {
                return Err(format!("pool `{name}` invalid: taskTimeout must be greater than 0"));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DOCFLOW_*` environment variables, loading a
    /// `.env` file first when present. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, String>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        read_var(&lookup, "DOCFLOW_MAX_WORKERS", &mut cfg.worker_pool.max_workers)?;
        read_var(&lookup, "DOCFLOW_QUEUE_SIZE", &mut cfg.worker_pool.queue_size)?;
        read_var(&lookup, "DOCFLOW_TASK_TIMEOUT_MS", &mut cfg.worker_pool.task_timeout)?;
        read_var(
            &lookup,
            "DOCFLOW_CB_FAILURE_THRESHOLD",
            &mut cfg.circuit_breaker.failure_threshold,
        )?;
        read_var(
            &lookup,
            "DOCFLOW_CB_RESET_TIMEOUT_MS",
            &mut cfg.circuit_breaker.reset_timeout,
        )?;
        read_var(&lookup, "DOCFLOW_RATE_MAX_REQUESTS", &mut cfg.rate_limit.max_requests)?;
        read_var(&lookup, "DOCFLOW_RATE_WINDOW_MS", &mut cfg.rate_limit.window_ms)?;
        read_var(&lookup, "DOCFLOW_RATE_BURST_LIMIT", &mut cfg.rate_limit.burst_limit)?;
        read_var(&lookup, "DOCFLOW_SHUTDOWN_TIMEOUT_MS", &mut cfg.shutdown.timeout_ms)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Effective limits for a pool, applying overrides.
    #[must_use]
    pub fn limits_for(&self, pool: &str) -> PoolLimits {
        let base = &self.worker_pool;
        let over = self.pools.get(pool);
        PoolLimits {
            max_workers: over.and_then(|o| o.max_workers).unwrap_or(base.max_workers),
            max_queue: over.and_then(|o| o.queue_size).unwrap_or(base.queue_size),
            default_timeout: Duration::from_millis(
                over.and_then(|o| o.task_timeout).unwrap_or(base.task_timeout),
            ),
        }
    }
}

fn read_var<L, T>(lookup: &L, key: &str, slot: &mut T) -> Result<(), String>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
