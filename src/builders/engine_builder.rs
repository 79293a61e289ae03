//! Fluent construction of an [`Engine`].

use std::time::Duration;

use crate::config::{
    BatchConfig, CircuitBreakerConfig, EngineConfig, MaintenanceConfig, PoolOverride,
    RateLimitConfig, RetryConfig, ShutdownConfig,
};
use crate::core::{Engine, EngineError};

/// Builder over [`EngineConfig`]; validation happens in [`EngineBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Start from default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub const fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration accumulated so far.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Default worker ceiling for every pool.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.config.worker_pool.max_workers = max_workers;
        self
    }

    /// Default queue ceiling for every pool.
    #[must_use]
    pub const fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.config.worker_pool.queue_size = queue_size;
        self
    }

    /// Default per-attempt timeout.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.config.worker_pool = self.config.worker_pool.with_task_timeout(timeout);
        self
    }

    /// Circuit breaker thresholds.
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Rate limiter settings.
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Retry backoff.
    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Batch settings.
    #[must_use]
    pub fn with_batch(mut self, config: BatchConfig) -> Self {
        self.config.batch = config;
        self
    }

    /// Maintenance cadence.
    #[must_use]
    pub fn with_maintenance(mut self, config: MaintenanceConfig) -> Self {
        self.config.maintenance = config;
        self
    }

    /// Shutdown bounds.
    #[must_use]
    pub fn with_shutdown(mut self, config: ShutdownConfig) -> Self {
        self.config.shutdown = config;
        self
    }

    /// Override limits for one pool.
    #[must_use]
    pub fn with_pool(mut self, name: impl Into<String>, limits: PoolOverride) -> Self {
        self.config.pools.insert(name.into(), limits);
        self
    }

    /// Shorthand for overriding only a pool's worker ceiling.
    #[must_use]
    pub fn with_pool_workers(mut self, name: impl Into<String>, max_workers: usize) -> Self {
        self.config
            .pools
            .entry(name.into())
            .or_default()
            .max_workers = Some(max_workers);
        self
    }

    /// Replace the pools created at startup.
    #[must_use]
    pub fn with_preregistered_pools<I, S>(mut self, pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.preregistered_pools = pools.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and start the engine.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] when validation fails.
    pub fn build(self) -> Result<Engine, EngineError> {
        Engine::new(self.config)
    }
}
