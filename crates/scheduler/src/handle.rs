use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::lane::Lane;

const PENDING: u8 = 0;
const FIRING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELLED: u8 = 3;

/// Where a scheduled entry is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryState {
    /// Waiting for its next due time.
    Pending,
    /// Its action is running on the lane right now.
    Firing,
    /// A one-shot entry that has fired.
    Completed,
    /// Cancelled by a handle, by exhausting its firing budget or by
    /// scheduler shutdown. Never fires again.
    Cancelled,
}

/// State shared by a scheduled entry and all handles to it.
pub(crate) struct EntryShared {
    id: u64,
    state: AtomicU8,
    fired: AtomicU64,
}

impl EntryShared {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: AtomicU8::new(PENDING),
            fired: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Pending -> Firing. Fails if the entry was cancelled.
    pub(crate) fn begin_firing(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Firing -> Pending (repeating) or Completed (one-shot). Fails if the
    /// entry was cancelled while firing, in which case it must not be
    /// rescheduled.
    pub(crate) fn end_firing(&self, repeat: bool) -> bool {
        self.fired.fetch_add(1, Ordering::Relaxed);
        let next = if repeat { PENDING } else { COMPLETED };
        self.state
            .compare_exchange(FIRING, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `false` if the entry had already completed or been cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == COMPLETED || current == CANCELLED {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub(crate) fn state(&self) -> EntryState {
        match self.state.load(Ordering::Acquire) {
            PENDING => EntryState::Pending,
            FIRING => EntryState::Firing,
            COMPLETED => EntryState::Completed,
            _ => EntryState::Cancelled,
        }
    }

    pub(crate) fn fire_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

/// Handle to a scheduled entry, returned by `Scheduler::schedule`.
///
/// Cloning yields another handle to the same entry. Dropping every handle
/// does not cancel the entry.
#[derive(Clone)]
pub struct ScheduleHandle {
    entry: Arc<EntryShared>,
    lane: Weak<Lane>,
}

impl ScheduleHandle {
    pub(crate) fn new(entry: Arc<EntryShared>, lane: Weak<Lane>) -> Self {
        Self { entry, lane }
    }

    /// Scheduler-unique id of the entry, in scheduling order.
    pub fn id(&self) -> u64 {
        self.entry.id()
    }

    /// Prevent every future firing. A firing already in progress runs to
    /// completion. Returns `false` if the entry had already completed or
    /// been cancelled.
    pub fn cancel(&self) -> bool {
        if !self.entry.cancel() {
            return false;
        }
        if let Some(lane) = self.lane.upgrade() {
            lane.request_purge();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.entry.is_cancelled()
    }

    pub fn state(&self) -> EntryState {
        self.entry.state()
    }

    /// Number of times the action has run, failed runs included.
    pub fn fire_count(&self) -> u64 {
        self.entry.fire_count()
    }
}

impl fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("fire_count", &self.fire_count())
            .finish()
    }
}
