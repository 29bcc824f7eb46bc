use std::sync::PoisonError;

use tracing::{error, info, warn};

use crate::stats::{Counters, Lifecycle};

use super::WorkerPool;

/// What `stop` could confirm about the pool's threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every worker thread has exited.
    Complete,
    /// Shutdown was requested but termination could not be confirmed, e.g.
    /// because `stop` was called from one of the pool's own workers.
    Unconfirmed,
}

impl WorkerPool {
    /// Stop the pool. Safe to call more than once and from any thread.
    ///
    /// New submissions are rejected from this point on. With `immediate`,
    /// queued jobs that have not started are discarded (their callable
    /// handles resolve as cancelled); running jobs cannot be preempted and
    /// finish normally. Without `immediate`, every queued job runs first.
    ///
    /// Blocks until all worker threads have exited, logging the number of
    /// jobs still queued at every poll interval.
    pub fn stop(&self, immediate: bool) -> Termination {
        info!(pool = %self.shared.name, immediate, "shutdown worker");

        let discarded = {
            let mut queue = self.shared.lock();
            if queue.lifecycle == Lifecycle::Running {
                queue.lifecycle = Lifecycle::Draining;
            }
            if queue.live_workers == 0 {
                queue.lifecycle = Lifecycle::Stopped;
            }
            let discarded: Vec<_> = if immediate {
                queue.jobs.drain(..).collect()
            } else {
                Vec::new()
            };
            self.shared.available.notify_all();
            discarded
        };

        if !discarded.is_empty() {
            warn!(pool = %self.shared.name, discarded = discarded.len(), "discarding queued jobs");
            for job in discarded {
                job.discard();
                Counters::bump(&self.shared.counters.cancelled);
            }
        }

        if self.shared.is_worker_thread() {
            warn!(pool = %self.shared.name, "stop called from a worker thread, not waiting for termination");
            return Termination::Unconfirmed;
        }

        let termination = self.await_termination();
        if termination == Termination::Complete {
            self.join_threads();
        }
        termination
    }

    fn await_termination(&self) -> Termination {
        let mut queue = self.shared.lock();
        while queue.lifecycle != Lifecycle::Stopped {
            match self
                .shared
                .terminated
                .wait_timeout(queue, self.shutdown_poll_interval)
            {
                Ok((guard, timeout)) => {
                    queue = guard;
                    if timeout.timed_out() && queue.lifecycle != Lifecycle::Stopped {
                        info!(
                            pool = %self.shared.name,
                            surplus = queue.jobs.len(),
                            running = queue.live_workers,
                            "waiting for worker's submitted tasks to complete execution"
                        );
                    }
                }
                Err(e) => {
                    error!(pool = %self.shared.name, error = %e, "worker shutdown, and waiting for terminated err");
                    return Termination::Unconfirmed;
                }
            }
        }
        Termination::Complete
    }

    fn join_threads(&self) {
        let handles: Vec<_> = self
            .threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            let thread_name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(pool = %self.shared.name, thread = %thread_name, "worker thread panicked");
            }
        }
    }
}
