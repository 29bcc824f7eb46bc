//! The single execution lane: a due-time ordered heap drained by one thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, error, warn};

use taskline_core::{run_guarded, Work};

use crate::event::ScheduleMode;
use crate::handle::EntryShared;
use crate::stats::Counters;

/// A scheduled action with its next due time.
pub(crate) struct Entry {
    pub(crate) due: Instant,
    /// Tie-breaker so entries due at the same instant fire in schedule order.
    pub(crate) seq: u64,
    pub(crate) mode: ScheduleMode,
    pub(crate) action: Box<dyn Work>,
    pub(crate) shared: Arc<EntryShared>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: `BinaryHeap` is a max-heap and the earliest entry must be on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) struct LaneState {
    pub(crate) heap: BinaryHeap<Entry>,
    pub(crate) stopped: bool,
    /// Set when a handle cancels an entry that may still sit in the heap.
    purge_requested: bool,
    next_seq: u64,
}

impl LaneState {
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// State shared by the scheduler, its lane thread and entry handles.
pub(crate) struct Lane {
    pub(crate) name: String,
    state: Mutex<LaneState>,
    /// Signalled on new entries, purge requests and stop.
    wakeup: Condvar,
    pub(crate) next_id: AtomicU64,
    pub(crate) counters: Counters,
}

impl Lane {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            state: Mutex::new(LaneState {
                heap: BinaryHeap::new(),
                stopped: false,
                purge_requested: false,
                next_seq: 0,
            }),
            wakeup: Condvar::new(),
            next_id: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Actions never run under this lock, so a poisoned lock still holds
    /// consistent state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, LaneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wake(&self) {
        self.wakeup.notify_one();
    }

    pub(crate) fn wake_all(&self) {
        self.wakeup.notify_all();
    }

    pub(crate) fn request_purge(&self) {
        self.lock().purge_requested = true;
        self.wake();
    }

    /// Block until the earliest live entry is due, pop it and mark it
    /// firing, all under the lane lock so `stop` either cancels the entry
    /// or sees it as in flight. Returns `None` once the scheduler is stopped.
    fn next_due(&self) -> Option<Entry> {
        // Declared before the guard: cancelled entries drop after unlock.
        let mut stale = Vec::new();
        let mut state = self.lock();
        loop {
            if state.stopped {
                return None;
            }
            if state.purge_requested {
                state.purge_requested = false;
                let (live, dead): (Vec<_>, Vec<_>) = std::mem::take(&mut state.heap)
                    .into_iter()
                    .partition(|entry| !entry.shared.is_cancelled());
                state.heap = live.into();
                stale.extend(dead);
            }

            let now = Instant::now();
            state = match state.heap.peek().map(|top| top.due) {
                Some(due) if due <= now => {
                    if let Some(entry) = state.heap.pop() {
                        if entry.shared.begin_firing() {
                            return Some(entry);
                        }
                        stale.push(entry);
                    }
                    continue;
                }
                Some(due) => {
                    self.wakeup
                        .wait_timeout(state, due - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Run a firing entry's action once, outside the lock.
    fn fire(&self, entry: &mut Entry) {
        let result = run_guarded(entry.action.as_mut());
        self.counters.record_firing(result.is_err());
        if let Err(e) = result {
            error!(
                scheduler = %self.name,
                origin = %entry.action.origin(),
                entry = entry.shared.id(),
                error = %e,
                "scheduled event error"
            );
        }
    }

    /// Put a fired entry back in the heap if it repeats and is still live.
    fn reschedule(&self, mut entry: Entry) {
        let repeat = entry.mode != ScheduleMode::Once;
        if !entry.shared.end_firing(repeat) {
            debug!(scheduler = %self.name, entry = entry.shared.id(), "entry cancelled while firing");
            return;
        }

        let next_due = match entry.mode {
            ScheduleMode::Once => return,
            // Measured from the previous due time, so a late firing is
            // followed straight away by the overdue ones.
            ScheduleMode::FixedRate(period) => entry.due.checked_add(period),
            ScheduleMode::FixedDelay(delay) => Instant::now().checked_add(delay),
        };

        // A due time past the clock's range never arrives.
        let Some(due) = next_due else {
            warn!(
                scheduler = %self.name,
                origin = %entry.action.origin(),
                entry = entry.shared.id(),
                "next due time out of range, entry cancelled"
            );
            entry.shared.cancel();
            return;
        };

        let mut state = self.lock();
        if state.stopped {
            drop(state);
            entry.shared.cancel();
            return;
        }
        entry.due = due;
        entry.seq = state.next_seq();
        state.heap.push(entry);
    }
}

/// Body of the lane thread.
pub(crate) fn lane_loop(lane: Arc<Lane>) {
    debug!(scheduler = %lane.name, "scheduler lane started");

    while let Some(mut entry) = lane.next_due() {
        lane.fire(&mut entry);
        lane.reschedule(entry);
    }

    debug!(scheduler = %lane.name, "scheduler lane exited");
}
