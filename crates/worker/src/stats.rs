use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Pool lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    /// Accepting submissions.
    Running,
    /// Stop requested; workers finish what is left in the queue.
    Draining,
    /// All worker threads have exited.
    Stopped,
}

/// Snapshot of pool counters, serializable for status endpoints and logs.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub lifecycle: Lifecycle,
    /// Configured worker thread count.
    pub workers: usize,
    /// Worker threads still running.
    pub live_workers: usize,
    /// Jobs waiting in the queue.
    pub queued: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

/// How a single job execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) cancelled: AtomicU64,
}

impl Counters {
    pub(crate) fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Failed => &self.failed,
            Outcome::Cancelled => &self.cancelled,
        };
        Self::bump(counter);
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
