//! Composable task decorators.
//!
//! Submission wraps work innermost to outermost as
//! `WithTimeout -> WithRetry -> WithBreaker`, so every retry attempt gets its
//! own deadline and the breaker only sees the outcome after all retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::core::pool::panic_message;
use crate::core::{CircuitBreakerRegistry, EngineError, SharedTask, Task};

/// Delay before attempt `attempt + 1`: `base * 2^attempt`, capped at `max`.
#[must_use]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(config.base_delay_ms.saturating_mul(factor).min(config.max_delay_ms))
}

/// Races each attempt against a deadline.
///
/// The inner call runs on its own Tokio task. When the deadline wins the
/// caller gets [`EngineError::Timeout`] and the inner task keeps running
/// detached; it is not aborted.
pub struct WithTimeout<T> {
    inner: SharedTask<T>,
    timeout: Duration,
}

impl<T: Send + 'static> WithTimeout<T> {
    /// Wrap `inner` with a per-call deadline.
    #[must_use]
    pub fn new(inner: SharedTask<T>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<T: Send + 'static> Task<T> for WithTimeout<T> {
    async fn run(&self) -> Result<T, EngineError> {
        let inner = Arc::clone(&self.inner);
        let call = tokio::spawn(async move { inner.run().await });
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(EngineError::Panicked(match join.try_into_panic() {
                Ok(panic) => panic_message(panic.as_ref()),
                Err(join) => join.to_string(),
            })),
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis(), "task attempt timed out");
                Err(EngineError::Timeout(self.timeout))
            }
        }
    }
}

/// Re-runs a failing task up to `retries` extra times with exponential backoff.
pub struct WithRetry<T> {
    inner: SharedTask<T>,
    retries: u32,
    backoff: RetryConfig,
}

impl<T: Send + 'static> WithRetry<T> {
    /// Allow `retries` additional attempts after the first.
    #[must_use]
    pub fn new(inner: SharedTask<T>, retries: u32, backoff: RetryConfig) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Task<T> for WithRetry<T> {
    async fn run(&self) -> Result<T, EngineError> {
        let mut attempt = 0;
        loop {
            match self.inner.run().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.retries => {
                    if self.retries == 0 {
                        return Err(err);
                    }
                    warn!(attempts = attempt + 1, error = %err, "retries exhausted");
                    return Err(EngineError::RetryExhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = backoff_delay(&self.backoff, attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "attempt failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Fails fast while the named breaker is open; otherwise runs the inner task
/// and reports its final outcome to the breaker.
pub struct WithBreaker<T> {
    inner: SharedTask<T>,
    name: String,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl<T: Send + 'static> WithBreaker<T> {
    /// Attribute outcomes of `inner` to breaker `name`.
    #[must_use]
    pub fn new(inner: SharedTask<T>, name: impl Into<String>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            inner,
            name: name.into(),
            breakers,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Task<T> for WithBreaker<T> {
    async fn run(&self) -> Result<T, EngineError> {
        // Work queued before the breaker opened must not reach the dependency.
        if self.breakers.is_open(&self.name) {
            debug!(breaker = %self.name, "skipped: circuit open");
            return Err(EngineError::CircuitOpen(self.name.clone()));
        }
        let result = self.inner.run().await;
        match &result {
            Ok(_) => self.breakers.record_success(&self.name),
            Err(_) => self.breakers.record_failure(&self.name),
        }
        result
    }
}
