//! Unit-of-work abstraction.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::{AppResult, EngineError};

/// A re-invocable unit of work producing `T`.
///
/// `run` takes `&self` because the retry wrapper may invoke the same task
/// several times. Decorators in [`crate::core::wrappers`] implement this
/// trait by delegating to an inner task.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use docflow_engine::core::{EngineError, Task};
///
/// struct ScoreDocument { id: u64 }
///
/// #[async_trait]
/// impl Task<f32> for ScoreDocument {
///     async fn run(&self) -> Result<f32, EngineError> {
///         Ok(0.87)
///     }
/// }
/// ```
#[async_trait]
pub trait Task<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Execute one attempt of the work.
    async fn run(&self) -> Result<T, EngineError>;
}

/// Shared, type-erased task.
pub type SharedTask<T> = Arc<dyn Task<T>>;

#[async_trait]
impl<T> Task<T> for Arc<dyn Task<T>>
where
    T: Send + 'static,
{
    async fn run(&self) -> Result<T, EngineError> {
        (**self).run().await
    }
}

/// Adapter turning a closure into a [`Task`]. Build it with [`task_fn`].
#[derive(Clone)]
pub struct FnTask<F> {
    f: F,
}

/// Wrap a closure returning `anyhow::Result<T>` as a [`Task`].
///
/// Errors become [`EngineError::Task`].
pub const fn task_fn<F, Fut, T>(f: F) -> FnTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    FnTask { f }
}

#[async_trait]
impl<F, Fut, T> Task<T> for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    async fn run(&self) -> Result<T, EngineError> {
        (self.f)().await.map_err(EngineError::Task)
    }
}
