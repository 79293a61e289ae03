//! Common serializable types shared across the engine.

use serde::{Deserialize, Serialize};

/// Unique task identifier, assigned per engine from a monotonic counter.
pub type TaskId = u64;

/// Scheduling priority of a submission.
///
/// Ordering follows importance: `Critical > High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work.
    Low,
    /// Regular work (default).
    #[default]
    Medium,
    /// Latency-sensitive work.
    High,
    /// Must run before anything else queued.
    Critical,
}

impl Priority {
    /// Every priority, most urgent first.
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Queue rank: `critical=0, high=1, medium=2, low=3`. Lower runs first.
    #[must_use]
    pub const fn rank(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}
