//! Per-pool hybrid sliding-window + burst-token admission control.
//!
//! A request is admitted when fewer than `max_requests` admissions fall inside
//! the trailing window. Once the window is full, a request may still pass by
//! spending a burst token. Tokens refill at one per whole elapsed second, up
//! to `burst_limit`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::util::clock::{self, Instant};

const REFILL_PERIOD: Duration = Duration::from_secs(1);

/// Why a request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within the sliding-window allowance.
    Window,
    /// Window exhausted; a burst token was spent.
    Burst,
}

#[derive(Debug)]
struct LimiterState {
    admitted: VecDeque<Instant>,
    tokens: u32,
    last_refill: Instant,
}

impl LimiterState {
    fn new(burst_limit: u32, now: Instant) -> Self {
        Self {
            admitted: VecDeque::new(),
            tokens: burst_limit,
            last_refill: now,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .admitted
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) >= window)
        {
            self.admitted.pop_front();
        }
    }

    fn refill(&mut self, now: Instant, burst_limit: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let whole = elapsed.as_secs();
        if whole == 0 {
            return;
        }
        let added = u32::try_from(whole).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(added).min(burst_limit);
        // Keep the fractional remainder so refills stay aligned to whole seconds.
        self.last_refill += REFILL_PERIOD * added;
    }
}

/// Snapshot of one limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Pool name.
    pub name: String,
    /// Admissions inside the current window.
    pub window_count: usize,
    /// Burst tokens available.
    pub burst_tokens: u32,
}

/// Registry of limiters keyed by pool name.
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    limiters: RwLock<HashMap<String, Arc<Mutex<LimiterState>>>>,
}

impl RateLimiterRegistry {
    /// Create an empty registry; every limiter shares `config`.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, name: &str) -> Arc<Mutex<LimiterState>> {
        if let Some(entry) = self.limiters.read().get(name) {
            return Arc::clone(entry);
        }
        let burst = self.config.burst_limit;
        Arc::clone(
            self.limiters
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(LimiterState::new(burst, clock::now())))),
        )
    }

    /// Check and record one request for `name`. `None` means denied.
    pub fn try_acquire(&self, name: &str) -> Option<Admission> {
        let now = clock::now();
        let entry = self.entry(name);
        let mut state = entry.lock();
        state.prune(now, self.config.window());
        state.refill(now, self.config.burst_limit);

        let admission = if state.admitted.len() < self.config.max_requests {
            Admission::Window
        } else if state.tokens > 0 {
            state.tokens -= 1;
            Admission::Burst
        } else {
            warn!(
                pool = name,
                window_count = state.admitted.len(),
                "rate limit exceeded"
            );
            return None;
        };
        state.admitted.push_back(now);
        if admission == Admission::Burst {
            debug!(pool = name, tokens_left = state.tokens, "admitted on burst token");
        }
        Some(admission)
    }

    /// Snapshot of every limiter, sorted by name. Reads only.
    #[must_use]
    pub fn stats(&self) -> Vec<LimiterStats> {
        let now = clock::now();
        let window = self.config.window();
        let mut stats: Vec<_> = self
            .limiters
            .read()
            .iter()
            .map(|(name, entry)| {
                let state = entry.lock();
                LimiterStats {
                    name: name.clone(),
                    window_count: state
                        .admitted
                        .iter()
                        .filter(|at| now.saturating_duration_since(**at) < window)
                        .count(),
                    burst_tokens: state.tokens,
                }
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}
