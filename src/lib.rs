//! # Docflow Engine
//!
//! A multi-pool task execution engine for document-processing backends.
//!
//! Work is submitted to a named pool. Each pool has a bounded set of worker
//! slots and a priority queue. Before anything is queued, a submission passes
//! admission control: the pool's rate limiter and, when requested, a named
//! circuit breaker guarding a downstream dependency.
//!
//! ## Key Features
//!
//! - **Priority scheduling**: critical, high, medium and low buckets, FIFO
//!   within a bucket, bounded queue per pool
//! - **Circuit breakers**: consecutive-failure breakers that fail fast while open
//! - **Rate limiting**: sliding window with a refilling burst allowance
//! - **Timeout and retry**: per-attempt deadlines and exponential backoff
//! - **Batching**: debounced coalescing of small independent tasks, plus
//!   chunked bulk submission with isolated or fail-fast error handling
//! - **Maintenance**: periodic expiry of stale queued work and statistics logging
//! - **Graceful shutdown**: bounded draining with an explicit report
//!
//! ```rust,ignore
//! use docflow_engine::builders::EngineBuilder;
//! use docflow_engine::core::{task_fn, SubmitOptions};
//! use docflow_engine::util::Priority;
//!
//! let engine = EngineBuilder::new()
//!     .with_max_workers(8)
//!     .with_pool_workers("ai-analysis", 2)
//!     .build()?;
//!
//! let summary = engine
//!     .submit(
//!         "ai-analysis",
//!         task_fn(|| async { summarize(doc).await }),
//!         SubmitOptions::new().with_priority(Priority::High).with_retries(2),
//!     )?
//!     .await?;
//!
//! let report = engine.shutdown().await;
//! ```
//!
//! For complete scenarios, see `tests/engine_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Engine, pools, admission control and task decorators.
pub mod core;
/// Configuration models for the engine and its pools.
pub mod config;
/// Builders to construct an engine from configuration.
pub mod builders;
/// Infrastructure adapters for queue storage.
pub mod infra;
/// Shared utilities.
pub mod util;
