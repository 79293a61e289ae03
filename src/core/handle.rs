//! Caller-side completion handle.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::core::EngineError;
use crate::util::serde::TaskId;

/// Future resolving once with the outcome of a submitted task.
///
/// Dropping the handle does not cancel the task; it only discards the result.
/// If the engine discards the task without settling it, the handle resolves
/// to [`EngineError::ShuttingDown`].
#[must_use = "a TaskHandle does nothing unless awaited"]
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<Result<T, EngineError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) const fn new(id: TaskId, rx: oneshot::Receiver<Result<T, EngineError>>) -> Self {
        Self { id, rx }
    }

    /// Identifier assigned at submission.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EngineError::ShuttingDown)))
    }
}
