//! Observability (tracing setup, dispatch counters)

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honouring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Counters shared by every worker of a pool
#[derive(Debug, Default)]
pub struct Metrics {
    transfers_succeeded: AtomicU64,
    transfers_failed: AtomicU64,
    empty_polls: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfer_succeeded(&self) {
        self.transfers_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "transfers_succeeded", "Metric incremented");
    }

    pub fn transfer_failed(&self) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "transfers_failed", "Metric incremented");
    }

    pub fn empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transfers_succeeded: self.transfers_succeeded.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub transfers_succeeded: u64,
    pub transfers_failed: u64,
    pub empty_polls: u64,
}

impl MetricsSnapshot {
    /// Tasks taken off the queue, whatever the outcome
    pub fn dispatched(&self) -> u64 {
        self.transfers_succeeded + self.transfers_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = Metrics::new();
        metrics.transfer_succeeded();
        metrics.transfer_succeeded();
        metrics.transfer_failed();
        metrics.empty_poll();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transfers_succeeded, 2);
        assert_eq!(snapshot.transfers_failed, 1);
        assert_eq!(snapshot.empty_polls, 1);
        assert_eq!(snapshot.dispatched(), 3);
    }
}
