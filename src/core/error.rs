//! Error types for engine operations.

use std::time::Duration;

use thiserror::Error;

/// A single failed item inside a batch submission.
#[derive(Debug)]
pub struct BatchItemError {
    /// Position of the item in the submitted batch.
    pub index: usize,
    /// Why it failed.
    pub error: EngineError,
}

/// Errors produced by the engine.
///
/// Every variant settles the caller's own handle (or is returned
/// synchronously at admission); none is fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Pool queue is at its configured length limit.
    #[error("queue full for pool `{pool}` (limit {limit})")]
    QueueFull {
        /// Target pool.
        pool: String,
        /// Configured queue length limit.
        limit: usize,
    },
    /// The pool's rate limiter denied admission.
    #[error("rate limit exceeded for pool `{0}`")]
    RateLimitExceeded(String),
    /// The named circuit breaker is open; the work was never invoked.
    #[error("circuit breaker `{0}` is open")]
    CircuitOpen(String),
    /// The wrapped call did not complete within its deadline.
    #[error("task timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Every retry attempt failed; `last` is the final attempt's error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: Box<EngineError>,
    },
    /// Evicted by the maintenance sweep while still queued.
    #[error("task expired after {}ms in queue of pool `{pool}`", .waited.as_millis())]
    Expired {
        /// Pool the task was queued in.
        pool: String,
        /// How long it waited.
        waited: Duration,
    },
    /// Fail-fast batch aborted on its first failure.
    #[error("batch failed: {} failure(s) after {completed} completed item(s)", .failures.len())]
    BatchAggregateFailure {
        /// Items that completed successfully before the abort.
        completed: usize,
        /// Failures encountered.
        failures: Vec<BatchItemError>,
    },
    /// The engine is shutting down (or dropped) before the task settled.
    #[error("engine is shutting down")]
    ShuttingDown,
    /// The task panicked while running.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Business failure returned by the task itself.
    #[error("task failed: {0:#}")]
    Task(anyhow::Error),
}

impl EngineError {
    /// Innermost error, looking through [`EngineError::RetryExhausted`].
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::RetryExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Whether the (root) error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout(_))
    }

    /// Whether the error was raised by an admission check before enqueue.
    #[must_use]
    pub const fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. }
                | Self::RateLimitExceeded(_)
                | Self::CircuitOpen(_)
                | Self::ShuttingDown
        )
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Task(err)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_looks_through_retry() {
        let err = EngineError::RetryExhausted {
            attempts: 3,
            last: Box::new(EngineError::Timeout(Duration::from_millis(50))),
        };
        assert!(err.is_timeout());
        assert!(matches!(err.root(), EngineError::Timeout(_)));
    }

    #[test]
    fn admission_rejections() {
        assert!(EngineError::RateLimitExceeded("api".into()).is_admission_rejection());
        assert!(EngineError::CircuitOpen("db".into()).is_admission_rejection());
        assert!(!EngineError::Timeout(Duration::from_secs(1)).is_admission_rejection());
    }
}
