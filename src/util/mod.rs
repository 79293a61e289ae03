//! Shared utilities: clock helpers, common serializable types, telemetry.

pub mod clock;
pub mod serde;
pub mod telemetry;

pub use self::clock::{now, now_ms, Instant};
pub use self::serde::{Priority, TaskId};
pub use self::telemetry::init_tracing;
