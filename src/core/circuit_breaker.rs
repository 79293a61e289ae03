//! Named circuit breakers.
//!
//! A breaker counts consecutive failures of the calls wrapped with its name.
//! Reaching the threshold opens it until `reset_timeout` has passed. Closing
//! is lazy: the first state check at or after the reset time closes the
//! breaker and zeroes its count. There is no half-open trial call, and the
//! configured monitor window does not decay counts; only a success or a full
//! open/reset cycle clears them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;
use crate::util::clock::{self, Instant};

#[derive(Debug, Default)]
struct BreakerState {
    failures: u32,
    last_failure: Option<Instant>,
    open: bool,
    reset_at: Option<Instant>,
}

impl BreakerState {
    /// Lazily close an open breaker whose reset time has passed.
    fn refresh(&mut self, now: Instant) {
        if self.open && self.reset_at.is_some_and(|reset_at| now >= reset_at) {
            self.open = false;
            self.failures = 0;
            self.reset_at = None;
        }
    }
}

/// Snapshot of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    /// Breaker name.
    pub name: String,
    /// Whether calls currently fail fast.
    pub open: bool,
    /// Consecutive failures recorded.
    pub failures: u32,
    /// Milliseconds since the last failure, if any.
    pub last_failure_ms_ago: Option<u128>,
    /// Milliseconds until an open breaker may close.
    pub reopens_in_ms: Option<u128>,
}

/// Registry of breakers keyed by dependency name.
///
/// Entries are created on first use and live as long as the registry.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<Mutex<BreakerState>>>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, name: &str) -> Arc<Mutex<BreakerState>> {
        if let Some(entry) = self.breakers.read().get(name) {
            return Arc::clone(entry);
        }
        Arc::clone(self.breakers.write().entry(name.to_string()).or_default())
    }

    /// Whether the breaker rejects calls right now.
    ///
    /// Checking an open breaker whose reset time has passed closes it.
    pub fn is_open(&self, name: &str) -> bool {
        let entry = self.entry(name);
        let mut state = entry.lock();
        let was_open = state.open;
        state.refresh(clock::now());
        if was_open && !state.open {
            info!(breaker = name, "circuit breaker closed after reset timeout");
        }
        state.open
    }

    /// Record a successful wrapped call; clears the failure count.
    pub fn record_success(&self, name: &str) {
        let entry = self.entry(name);
        let mut state = entry.lock();
        state.refresh(clock::now());
        state.failures = 0;
    }

    /// Record a failed wrapped call; opens the breaker at the threshold.
    pub fn record_failure(&self, name: &str) {
        let now = clock::now();
        let entry = self.entry(name);
        let mut state = entry.lock();
        state.refresh(now);
        state.failures += 1;
        state.last_failure = Some(now);
        if !state.open && state.failures >= self.config.failure_threshold {
            state.open = true;
            state.reset_at = Some(now + self.config.reset_timeout());
            warn!(
                breaker = name,
                failures = state.failures,
                reset_after_ms = self.config.reset_timeout,
                "circuit breaker opened"
            );
        }
    }

    /// Number of breakers currently open. Reads only; does not close any.
    #[must_use]
    pub fn open_count(&self) -> usize {
        let now = clock::now();
        self.breakers
            .read()
            .values()
            .filter(|entry| {
                let state = entry.lock();
                state.open && state.reset_at.is_some_and(|reset_at| now < reset_at)
            })
            .count()
    }

    /// Snapshot of every breaker, sorted by name. Reads only.
    #[must_use]
    pub fn stats(&self) -> Vec<BreakerStats> {
        let now = clock::now();
        let mut stats: Vec<_> = self
            .breakers
            .read()
            .iter()
            .map(|(name, entry)| {
                let state = entry.lock();
                let open = state.open && state.reset_at.is_some_and(|reset_at| now < reset_at);
                BreakerStats {
                    name: name.clone(),
                    open,
                    failures: state.failures,
                    last_failure_ms_ago: state
                        .last_failure
                        .map(|at| now.saturating_duration_since(at).as_millis()),
                    reopens_in_ms: state
                        .reset_at
                        .filter(|_| open)
                        .map(|at| at.saturating_duration_since(now).as_millis()),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Configured reset timeout.
    #[must_use]
    pub const fn reset_timeout(&self) -> Duration {
        self.config.reset_timeout()
    }
}
