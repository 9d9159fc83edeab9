//! Worker loop - polls the shared queue and hands tasks to the backend

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info_span, warn};

use super::signal::CancellationSignal;
use crate::backend::Backend;
use crate::observability::Metrics;
use crate::queue::TaskQueue;

/// Outcome of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A task was uploaded
    Dispatched,
    /// A task was taken but the upload failed; it is not requeued
    Failed,
    /// The queue had nothing
    Empty,
}

pub struct Worker {
    id: usize,
    queue: Arc<TaskQueue>,
    signal: CancellationSignal,
    backend: Arc<dyn Backend>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<TaskQueue>,
        signal: CancellationSignal,
        backend: Arc<dyn Backend>,
        metrics: Arc<Metrics>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            queue,
            signal,
            backend,
            metrics,
            poll_interval,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Take at most one task and transfer it
    pub fn poll_once(&self) -> Poll {
        let Some(task) = self.queue.try_pop() else {
            self.metrics.empty_poll();
            return Poll::Empty;
        };

        match self.backend.transfer(&task) {
            Ok(()) => {
                self.metrics.transfer_succeeded();
                debug!(
                    worker = self.id,
                    bucket = task.bucket(),
                    key = task.key(),
                    "Task transferred"
                );
                Poll::Dispatched
            }
            Err(e) => {
                self.metrics.transfer_failed();
                warn!(
                    worker = self.id,
                    bucket = task.bucket(),
                    key = task.key(),
                    source = %task.source_path().display(),
                    error = %e,
                    "Transfer failed, task dropped"
                );
                Poll::Failed
            }
        }
    }

    /// Poll until the signal is observed
    ///
    /// The signal is checked once per iteration, so an in-flight transfer and
    /// the following sleep always complete first.
    pub fn run(self) {
        let span = info_span!("worker", id = self.id);
        let _enter = span.enter();
        debug!("Worker started");

        while !self.signal.is_cancelled() {
            self.poll_once();
            thread::sleep(self.poll_interval);
        }

        debug!("Worker stopped");
    }
}
