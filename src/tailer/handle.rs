//! Handle to a tailer running on its own thread.

use super::machine::Tailer;
use super::types::{TailerMetrics, TailerPhase, TailerStats};
use crate::error::{Result, TailerError};
use crate::scheduler::CancellationToken;
use crate::source::ChangeFeedSource;
use crate::types::Position;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Owns a spawned tailer. Dropping the handle cancels and joins it.
pub struct TailerHandle<S: ChangeFeedSource, K> {
    cancel: CancellationToken,
    metrics: Arc<TailerMetrics>,
    thread: Option<JoinHandle<Tailer<S, K>>>,
}

impl<S: ChangeFeedSource, K> TailerHandle<S, K> {
    pub(crate) fn new(
        cancel: CancellationToken,
        metrics: Arc<TailerMetrics>,
        thread: JoinHandle<Tailer<S, K>>,
    ) -> Self {
        Self {
            cancel,
            metrics,
            thread: Some(thread),
        }
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> TailerStats {
        self.metrics.snapshot()
    }

    pub fn last_position(&self) -> Option<Position> {
        self.metrics.last_position()
    }

    pub fn phase(&self) -> TailerPhase {
        self.metrics.phase()
    }

    /// True once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Cancel the loop, wait for it to close its cursor, and hand the
    /// stopped tailer back.
    pub fn stop(mut self) -> Result<Tailer<S, K>> {
        self.cancel.cancel();
        let thread = self.thread.take().ok_or(TailerError::WorkerPanicked)?;
        thread.join().map_err(|_| TailerError::WorkerPanicked)
    }
}

impl<S: ChangeFeedSource, K> Drop for TailerHandle<S, K> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
