//! Time helpers.
//!
//! Scheduling decisions (expiry, breaker reset, rate windows) use
//! [`tokio::time::Instant`] so that paused-time tests can advance the clock.
//! Wall-clock epoch milliseconds are only used for reporting.

use std::time::{SystemTime, UNIX_EPOCH};

pub use tokio::time::Instant;

/// Monotonic "now" used by every scheduling decision.
#[must_use]
pub fn now() -> Instant {
    Instant::now()
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
