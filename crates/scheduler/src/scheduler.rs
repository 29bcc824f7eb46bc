use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use taskline_core::{SchedulerConfig, TasklineError, Work};

use crate::bounded::BoundedEvent;
use crate::event::{ScheduleMode, TimerEvent};
use crate::handle::{EntryShared, ScheduleHandle};
use crate::lane::{lane_loop, Entry, Lane};
use crate::stats::{Counters, SchedulerStats};

/// Runs timer events on one named background thread.
///
/// Firings never overlap: each one finishes before the next due event
/// starts. An event that fails or panics is logged and keeps its schedule.
pub struct Scheduler {
    lane: Arc<Lane>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start a scheduler whose lane thread is called `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, TasklineError> {
        let name = name.into();
        let lane = Arc::new(Lane::new(name.clone()));
        let worker = Arc::clone(&lane);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || lane_loop(worker))
            .map_err(|source| TasklineError::Spawn {
                name: name.clone(),
                source,
            })?;

        info!(scheduler = %name, "start scheduler service");
        Ok(Self {
            lane,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, TasklineError> {
        Self::new(config.name.clone())
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Schedule `event` according to its mode.
    ///
    /// Returns `None` if the scheduler has been stopped or the first delay
    /// is too large to represent as a point in time.
    pub fn schedule(&self, event: TimerEvent) -> Option<ScheduleHandle> {
        let shared = self.new_entry();
        let (mode, first_delay, action) = event.into_parts();
        self.insert(mode, first_delay, action, shared)
    }

    /// Schedule `event` to fire at most `count` times, after which its
    /// entry is cancelled. Failed firings count.
    ///
    /// Returns `None` if `count` is zero, the first delay is out of range or
    /// the scheduler has been stopped.
    pub fn schedule_bounded(&self, event: TimerEvent, count: u32) -> Option<ScheduleHandle> {
        if count == 0 {
            error!(scheduler = %self.lane.name, origin = %event.origin(), "event count must > 0, schedule rejected");
            Counters::bump(&self.lane.counters.rejected);
            return None;
        }

        let shared = self.new_entry();
        let (mode, first_delay, action) = event.into_parts();
        let bounded = BoundedEvent::new(action, count, Arc::clone(&shared));
        self.insert(mode, first_delay, Box::new(bounded), shared)
    }

    fn new_entry(&self) -> Arc<EntryShared> {
        let id = self.lane.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(EntryShared::new(id))
    }

    fn insert(
        &self,
        mode: ScheduleMode,
        first_delay: Duration,
        action: Box<dyn Work>,
        shared: Arc<EntryShared>,
    ) -> Option<ScheduleHandle> {
        let Some(due) = Instant::now().checked_add(first_delay) else {
            error!(scheduler = %self.lane.name, origin = %action.origin(), first_delay = ?first_delay, "event first delay out of range, schedule rejected");
            Counters::bump(&self.lane.counters.rejected);
            return None;
        };

        let mut state = self.lane.lock();
        if state.stopped {
            drop(state);
            error!(scheduler = %self.lane.name, origin = %action.origin(), "scheduler was stopped. schedule event failed");
            Counters::bump(&self.lane.counters.rejected);
            return None;
        }

        let seq = state.next_seq();
        state.heap.push(Entry {
            due,
            seq,
            mode,
            action,
            shared: Arc::clone(&shared),
        });
        drop(state);

        Counters::bump(&self.lane.counters.scheduled);
        self.lane.wake();
        Some(ScheduleHandle::new(shared, Arc::downgrade(&self.lane)))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Cancel every pending entry and release the lane thread. Safe to call
    /// more than once. Does not wait: a firing in progress runs to
    /// completion in the background.
    pub fn stop(&self) {
        let pending = {
            let mut state = self.lane.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            std::mem::take(&mut state.heap)
        };
        self.lane.wake_all();

        for entry in pending.iter() {
            entry.shared.cancel();
        }
        info!(scheduler = %self.lane.name, cancelled = pending.len(), "stop scheduler service");
    }

    pub fn is_stopped(&self) -> bool {
        self.lane.lock().stopped
    }

    pub fn name(&self) -> &str {
        &self.lane.name
    }

    /// Entries waiting for their next due time.
    pub fn pending(&self) -> usize {
        self.lane.lock().heap.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.lane.counters;
        let state = self.lane.lock();
        SchedulerStats {
            name: self.lane.name.clone(),
            stopped: state.stopped,
            pending: state.heap.len(),
            scheduled: Counters::get(&counters.scheduled),
            firings: Counters::get(&counters.firings),
            failures: Counters::get(&counters.failures),
            rejected: Counters::get(&counters.rejected),
            last_fired_at: counters.last_fired_at(),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();

        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            // Dropped from inside a firing: the lane exits on its own.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!(scheduler = %self.lane.name, "scheduler lane panicked");
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.lane.name)
            .finish()
    }
}
