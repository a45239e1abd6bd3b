//! Run counters for a polling manager.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the polling loop.
#[derive(Debug, Default)]
pub struct PollStats {
    batches: AtomicU64,
    updates_dispatched: AtomicU64,
    updates_failed: AtomicU64,
    fetch_retries: AtomicU64,
    iteration_errors: AtomicU64,
}

/// Point-in-time copy of [`PollStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollStatsSnapshot {
    /// Fetches that returned a batch, empty ones included.
    pub batches: u64,
    /// Updates handed to the pipeline, failed ones included.
    pub updates_dispatched: u64,
    pub updates_failed: u64,
    pub fetch_retries: u64,
    pub iteration_errors: u64,
}

impl PollStats {
    pub(crate) fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, failed: bool) {
        self.updates_dispatched.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.updates_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_fetch_retry(&self) {
        self.fetch_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_iteration_error(&self) {
        self.iteration_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PollStatsSnapshot {
        PollStatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            updates_dispatched: self.updates_dispatched.load(Ordering::Relaxed),
            updates_failed: self.updates_failed.load(Ordering::Relaxed),
            fetch_retries: self.fetch_retries.load(Ordering::Relaxed),
            iteration_errors: self.iteration_errors.load(Ordering::Relaxed),
        }
    }
}
