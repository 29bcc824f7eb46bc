use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};

use tracing::{debug, error};

use taskline_core::{run_guarded, Work};

use crate::handle::ErasedCallable;
use crate::stats::{Lifecycle, Outcome};

use super::core::Shared;

/// A queued job: fire-and-forget or result-producing.
pub(crate) enum Job {
    Work(Box<dyn Work>),
    Callable(Box<dyn ErasedCallable>),
}

impl Job {
    pub(crate) fn origin(&self) -> &str {
        match self {
            Job::Work(w) => w.origin(),
            Job::Callable(c) => c.origin(),
        }
    }

    /// Execute the job. Errors and panics are caught and logged here and
    /// never reach the worker loop.
    fn run(&mut self, pool: &str) -> Outcome {
        match self {
            Job::Work(work) => match run_guarded(work.as_mut()) {
                Ok(()) => Outcome::Completed,
                Err(e) => {
                    error!(pool = %pool, origin = %work.origin(), error = %e, "execute work error");
                    Outcome::Failed
                }
            },
            Job::Callable(callable) => callable.run(pool),
        }
    }

    /// Drop a job that will never run.
    pub(super) fn discard(mut self) {
        if let Job::Callable(callable) = &mut self {
            callable.discard();
        }
    }
}

impl Shared {
    /// Block until a job is available. Returns `None` once the pool is
    /// stopping and the queue is empty.
    fn next_job(&self) -> Option<Job> {
        let mut queue = self.lock();
        loop {
            if let Some(job) = queue.jobs.pop_front() {
                return Some(job);
            }
            if queue.lifecycle != Lifecycle::Running {
                return None;
            }
            queue = self
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn worker_exited(&self) {
        let mut queue = self.lock();
        queue.live_workers = queue.live_workers.saturating_sub(1);
        if queue.live_workers == 0 {
            queue.lifecycle = Lifecycle::Stopped;
            self.terminated.notify_all();
        }
    }
}

/// Body of every worker thread.
pub(super) fn worker_loop(shared: Arc<Shared>) {
    debug!(pool = %shared.name, "worker thread started");

    while let Some(mut job) = shared.next_job() {
        let outcome = job.run(&shared.name);
        shared.counters.record(outcome);

        let depth = shared.lock().jobs.len();
        if depth > shared.backlog_threshold {
            let notified = panic::catch_unwind(AssertUnwindSafe(|| {
                shared.observer.on_backlog(&shared.name, job.origin(), depth)
            }));
            if notified.is_err() {
                error!(pool = %shared.name, origin = %job.origin(), depth, "backlog observer panicked");
            }
        }
    }

    shared.worker_exited();
    debug!(pool = %shared.name, "worker thread exited");
}
