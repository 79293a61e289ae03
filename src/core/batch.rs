//! Debounced batch coalescing.
//!
//! Work added under a batch name is buffered. Every addition restarts that
//! name's debounce timer; when the timer finally fires, everything buffered is
//! started at once, each item on its own Tokio task so one failing (or
//! panicking) item never affects the rest. Batched work bypasses pool queues
//! and worker slots entirely.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::pool::BoxJob;
use crate::core::EngineError;

#[derive(Default)]
struct BatchBuffer {
    items: Vec<BoxJob>,
    timer: Option<JoinHandle<()>>,
}

/// Per-name debounce buffers.
pub(crate) struct BatchCoalescer {
    debounce: Duration,
    buffers: Mutex<HashMap<String, BatchBuffer>>,
}

impl BatchCoalescer {
    pub(crate) fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Buffer `job` under `name` and restart the debounce timer.
    pub(crate) fn add(self: &Arc<Self>, name: &str, job: BoxJob) {
        let weak = Arc::downgrade(self);
        let key = name.to_string();
        let debounce = self.debounce;

        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(key.clone()).or_default();
        buffer.items.push(job);
        if let Some(timer) = buffer.timer.take() {
            timer.abort();
        }
        let pending = buffer.items.len();
        buffer.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(coalescer) = Weak::upgrade(&weak) {
                coalescer.flush(&key);
            }
        }));
        debug!(batch = name, pending, "added to batch");
    }

    /// Start every buffered item for `name`.
    fn flush(&self, name: &str) {
        let items = {
            let mut buffers = self.buffers.lock();
            let Some(buffer) = buffers.get_mut(name) else {
                return;
            };
            buffer.timer = None;
            std::mem::take(&mut buffer.items)
        };
        debug!(batch = name, size = items.len(), "flushing batch");
        for job in items {
            tokio::spawn(async move {
                job.run().await;
            });
        }
    }

    /// Items currently buffered, per batch name.
    pub(crate) fn pending(&self) -> Vec<(String, usize)> {
        let mut pending: Vec<_> = self
            .buffers
            .lock()
            .iter()
            .filter(|(_, b)| !b.items.is_empty())
            .map(|(name, b)| (name.clone(), b.items.len()))
            .collect();
        pending.sort();
        pending
    }

    /// Cancel every timer and reject buffered items. Returns how many were
    /// rejected.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<BatchBuffer> = self
            .buffers
            .lock()
            .drain()
            .map(|(_, buffer)| buffer)
            .collect();
        let mut rejected = 0;
        for buffer in drained {
            if let Some(timer) = buffer.timer {
                timer.abort();
            }
            rejected += buffer.items.len();
            for job in buffer.items {
                job.reject(EngineError::ShuttingDown);
            }
        }
        rejected
    }
}
