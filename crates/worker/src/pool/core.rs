use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{error, info};

use taskline_core::{CallableWork, PoolConfig, TasklineError, Work};

use crate::backlog::BacklogObserver;
use crate::handle::{CallableHandle, CallableTask};
use crate::stats::{Counters, Lifecycle, PoolStats};

use super::builder::WorkerPoolBuilder;
use super::execution::{worker_loop, Job};

/// A fixed-size pool of named worker threads sharing one unbounded FIFO queue.
///
/// With a single worker, jobs start in submission order. With more workers
/// dequeue order is still FIFO, but jobs may start and finish out of order.
/// No timeout is enforced on jobs: one that never returns occupies its worker
/// indefinitely.
pub struct WorkerPool {
    pub(super) shared: Arc<Shared>,
    /// Worker thread handles, taken when joined.
    pub(super) threads: Mutex<Vec<JoinHandle<()>>>,
    pub(super) workers: usize,
    pub(super) shutdown_poll_interval: Duration,
}

/// State shared between the pool handle and its worker threads.
pub(super) struct Shared {
    pub(super) name: String,
    pub(super) queue: Mutex<QueueState>,
    /// Signalled when a job is queued or the lifecycle changes.
    pub(super) available: Condvar,
    /// Signalled when the last worker exits.
    pub(super) terminated: Condvar,
    pub(super) backlog_threshold: usize,
    pub(super) observer: Arc<dyn BacklogObserver>,
    pub(super) counters: Counters,
}

pub(super) struct QueueState {
    pub(super) jobs: VecDeque<Job>,
    pub(super) lifecycle: Lifecycle,
    pub(super) live_workers: usize,
    pub(super) worker_ids: Vec<ThreadId>,
}

impl Shared {
    /// Lock the queue. Jobs never run under this lock, so a poisoned lock
    /// still holds consistent state.
    pub(super) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.lock().worker_ids.contains(&current)
    }
}

impl WorkerPool {
    /// Start a pool with one worker thread and default settings.
    pub fn new(name: impl Into<String>) -> Result<Self, TasklineError> {
        WorkerPoolBuilder::new(name).build()
    }

    pub fn builder(name: impl Into<String>) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(name)
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, TasklineError> {
        WorkerPoolBuilder::from_config(config).build()
    }

    pub(super) fn start(builder: WorkerPoolBuilder) -> Result<Self, TasklineError> {
        let shared = Arc::new(Shared {
            name: builder.name,
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                lifecycle: Lifecycle::Running,
                live_workers: 0,
                worker_ids: Vec::with_capacity(builder.workers),
            }),
            available: Condvar::new(),
            terminated: Condvar::new(),
            backlog_threshold: builder.backlog_threshold,
            observer: builder.observer,
            counters: Counters::default(),
        });

        let pool = Self {
            shared,
            threads: Mutex::new(Vec::with_capacity(builder.workers)),
            workers: builder.workers,
            shutdown_poll_interval: builder.shutdown_poll_interval,
        };

        for index in 0..pool.workers {
            if let Err(e) = pool.spawn_worker(index) {
                pool.stop(true);
                return Err(e);
            }
        }

        info!(pool = %pool.shared.name, workers = pool.workers, "start worker pool");
        Ok(pool)
    }

    fn spawn_worker(&self, index: usize) -> Result<(), TasklineError> {
        let thread_name = format!("{}-{}", self.shared.name, index);
        let shared = Arc::clone(&self.shared);

        // Counted before the thread exists so a fast exit cannot underflow.
        self.shared.lock().live_workers += 1;

        match thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker_loop(shared))
        {
            Ok(handle) => {
                self.shared.lock().worker_ids.push(handle.thread().id());
                self.threads
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.lock().live_workers -= 1;
                Err(TasklineError::Spawn {
                    name: thread_name,
                    source,
                })
            }
        }
    }

    // ── Admission ───────────────────────────────────────────────────

    /// Queue `work` for asynchronous execution.
    ///
    /// Returns `false` without queuing if the pool has been stopped. Never
    /// waits for the job to run.
    pub fn execute<W: Work>(&self, work: W) -> bool {
        match self.enqueue(Job::Work(Box::new(work))) {
            Ok(()) => true,
            Err(job) => {
                error!(pool = %self.shared.name, origin = %job.origin(), "worker was shutdown. submit work failed");
                false
            }
        }
    }

    /// Queue a result-producing job.
    ///
    /// Returns `None` without queuing if the pool has been stopped. The
    /// handle resolves to the job's [`WorkResult`](taskline_core::WorkResult).
    pub fn submit_callable<C: CallableWork>(&self, work: C) -> Option<CallableHandle<C::Output>> {
        let (task, handle) = CallableTask::new(work);
        match self.enqueue(Job::Callable(Box::new(task))) {
            Ok(()) => Some(handle),
            Err(job) => {
                error!(pool = %self.shared.name, origin = %job.origin(), "worker was shutdown. submit callable failed");
                None
            }
        }
    }

    fn enqueue(&self, job: Job) -> Result<(), Job> {
        let mut queue = self.shared.lock();
        if queue.lifecycle != Lifecycle::Running {
            drop(queue);
            Counters::bump(&self.shared.counters.rejected);
            return Err(job);
        }
        queue.jobs.push_back(job);
        drop(queue);

        Counters::bump(&self.shared.counters.submitted);
        self.shared.available.notify_one();
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Configured number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs waiting to start.
    pub fn queued(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    /// True once `stop` has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().lifecycle != Lifecycle::Running
    }

    /// True once every worker thread has exited.
    pub fn is_terminated(&self) -> bool {
        self.shared.lock().lifecycle == Lifecycle::Stopped
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        let queue = self.shared.lock();
        PoolStats {
            name: self.shared.name.clone(),
            lifecycle: queue.lifecycle,
            workers: self.workers,
            live_workers: queue.live_workers,
            queued: queue.jobs.len(),
            submitted: Counters::get(&counters.submitted),
            completed: Counters::get(&counters.completed),
            failed: Counters::get(&counters.failed),
            rejected: Counters::get(&counters.rejected),
            cancelled: Counters::get(&counters.cancelled),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.is_shutdown() {
            self.stop(false);
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("workers", &self.workers)
            .finish()
    }
}
