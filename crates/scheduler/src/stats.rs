use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time snapshot of a scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub name: String,
    pub stopped: bool,
    /// Entries waiting for their next due time.
    pub pending: usize,
    /// Entries accepted since start.
    pub scheduled: u64,
    /// Action runs, failed ones included.
    pub firings: u64,
    /// Action runs that returned an error or panicked.
    pub failures: u64,
    /// Schedule calls refused after stop or with an empty firing budget.
    pub rejected: u64,
    pub last_fired_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) scheduled: AtomicU64,
    pub(crate) firings: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) rejected: AtomicU64,
    last_fired_at: Mutex<Option<DateTime<Utc>>>,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub(crate) fn record_firing(&self, failed: bool) {
        Self::bump(&self.firings);
        if failed {
            Self::bump(&self.failures);
        }
        *self
            .last_fired_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub(crate) fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_fired_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_firing_tracks_failures_and_time() {
        let counters = Counters::default();
        assert!(counters.last_fired_at().is_none());

        let before = Utc::now();
        counters.record_firing(false);
        counters.record_firing(true);

        assert_eq!(Counters::get(&counters.firings), 2);
        assert_eq!(Counters::get(&counters.failures), 1);
        assert!(counters.last_fired_at().unwrap() >= before);
    }
}
