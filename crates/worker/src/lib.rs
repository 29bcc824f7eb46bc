//! Fixed-size worker pool for fire-and-forget and result-producing jobs.
//!
//! A [`WorkerPool`] owns a set of named threads pulling from one shared
//! unbounded FIFO queue. Submission never blocks; the only rejection path is
//! submitting after [`WorkerPool::stop`].

pub mod backlog;
pub mod handle;
pub mod pool;
pub mod stats;

pub use backlog::{BacklogObserver, LogBacklogObserver};
pub use handle::CallableHandle;
pub use pool::{Termination, WorkerPool, WorkerPoolBuilder};
pub use stats::{Lifecycle, PoolStats};
pub use taskline_core::{
    callable_fn, work_fn, BoxError, CallableWork, Work, WorkError, WorkResult,
};
