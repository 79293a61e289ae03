//! Scheduling, admission control and task decorators.

mod batch;
pub mod circuit_breaker;
pub mod engine;
pub mod error;
pub mod handle;
pub mod pool;
pub mod rate_limiter;
pub mod task;
pub mod wrappers;

pub use circuit_breaker::{BreakerStats, CircuitBreakerRegistry};
pub use engine::{
    BatchOptions, BatchOutcome, Engine, EngineStats, ShutdownOutcome, ShutdownReport,
    SubmitOptions,
};
pub use error::{AppResult, BatchItemError, EngineError};
pub use handle::TaskHandle;
pub use pool::{PoolLimits, PoolStats, ScheduledTask, TaskMetadata, TaskQueue};
pub use rate_limiter::{Admission, LimiterStats, RateLimiterRegistry};
pub use task::{task_fn, FnTask, SharedTask, Task};
pub use wrappers::{backoff_delay, WithBreaker, WithRetry, WithTimeout};
