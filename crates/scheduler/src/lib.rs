//! Cooperative timer scheduler with a single serialized execution lane.
//!
//! Events run one at a time in due-time order, so a long-running event
//! delays every event due after it. Events can fire once, at a fixed rate
//! or with a fixed delay, optionally bounded to a number of firings.

pub(crate) mod bounded;
pub mod event;
pub mod handle;
mod lane;
pub mod scheduler;
pub mod stats;

pub use event::{ScheduleMode, TimerEvent};
pub use handle::{EntryState, ScheduleHandle};
pub use scheduler::Scheduler;
pub use stats::SchedulerStats;
pub use taskline_core::{work_fn, BoxError, Work};
