//! Configuration models for the engine, its pools and guards.

pub mod engine;

pub use engine::{
    BatchConfig, CircuitBreakerConfig, EngineConfig, MaintenanceConfig, PoolOverride,
    RateLimitConfig, RetryConfig, ShutdownConfig, WorkerPoolConfig, DEFAULT_POOLS,
};
