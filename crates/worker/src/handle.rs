//! Handles for result-producing jobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::error;

use taskline_core::{call_guarded, CallableWork, WorkError, WorkResult};

use crate::stats::Outcome;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Shared between a queued callable and its handle. Only one of `start` and
/// `cancel` can win.
#[derive(Debug)]
pub(crate) struct JobStatus(AtomicU8);

impl JobStatus {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(QUEUED))
    }

    fn start(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(&self) {
        self.0.store(DONE, Ordering::Release);
    }

    fn cancel(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn load(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

// ── Type-erased queued callable ─────────────────────────────────────

/// A queued [`CallableWork`] with its output type erased, so callables of
/// any output type share the pool's queue.
pub(crate) trait ErasedCallable: Send {
    fn origin(&self) -> &str;

    /// Run the job (unless cancelled) and deliver its result.
    fn run(&mut self, pool: &str) -> Outcome;

    /// Drop the job without running it; the handle resolves as cancelled.
    fn discard(&mut self);
}

pub(crate) struct CallableTask<C: CallableWork> {
    work: C,
    status: Arc<JobStatus>,
    reply: Option<oneshot::Sender<WorkResult<C::Output>>>,
}

impl<C: CallableWork> CallableTask<C> {
    pub(crate) fn new(work: C) -> (Self, CallableHandle<C::Output>) {
        let (tx, rx) = oneshot::channel();
        let status = Arc::new(JobStatus::new());
        let task = Self {
            work,
            status: Arc::clone(&status),
            reply: Some(tx),
        };
        (task, CallableHandle { rx, status })
    }

    fn reply(&mut self, result: WorkResult<C::Output>) {
        if let Some(tx) = self.reply.take() {
            // The caller may have dropped its handle; nothing to deliver then.
            let _ = tx.send(result);
        }
    }
}

impl<C: CallableWork> ErasedCallable for CallableTask<C> {
    fn origin(&self) -> &str {
        self.work.origin()
    }

    fn run(&mut self, pool: &str) -> Outcome {
        if !self.status.start() {
            self.reply(WorkResult::failed(WorkError::Cancelled));
            return Outcome::Cancelled;
        }

        let result = call_guarded(&mut self.work);
        let outcome = match result.error() {
            None => Outcome::Completed,
            Some(e) => {
                error!(pool = %pool, origin = %self.work.origin(), error = %e, "worker execute task error");
                Outcome::Failed
            }
        };
        self.status.finish();
        self.reply(result);
        outcome
    }

    fn discard(&mut self) {
        self.status.cancel();
        self.reply(WorkResult::failed(WorkError::Cancelled));
    }
}

// ── CallableHandle ──────────────────────────────────────────────────

/// Handle to a submitted [`CallableWork`].
///
/// Always resolves to a [`WorkResult`]: a job that errored or panicked yields
/// a failed result carrying the error, and a job that was cancelled or
/// discarded by an immediate stop yields `WorkError::Cancelled`.
///
/// Resolve it with [`wait`](Self::wait) from synchronous code or `.await` it
/// from async code.
pub struct CallableHandle<T> {
    rx: oneshot::Receiver<WorkResult<T>>,
    status: Arc<JobStatus>,
}

impl<T> CallableHandle<T> {
    /// Prevent the job from running if it has not started yet.
    ///
    /// Returns `true` if this call cancelled the job. A job that is already
    /// running cannot be interrupted and will finish normally.
    pub fn cancel(&self) -> bool {
        self.status.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.load() == CANCELLED
    }

    /// True once the job has run to completion or was cancelled.
    pub fn is_finished(&self) -> bool {
        matches!(self.status.load(), DONE | CANCELLED)
    }

    /// Block the current thread until the job's result is available.
    ///
    /// There is no timeout: a job that never returns blocks this call forever.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// `.await` the handle there instead.
    pub fn wait(self) -> WorkResult<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| cancelled())
    }
}

impl<T> Future for CallableHandle<T> {
    type Output = WorkResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or_else(|_| cancelled()))
    }
}

impl<T> std::fmt::Debug for CallableHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableHandle")
            .field("status", &self.status)
            .finish()
    }
}

fn cancelled<T>() -> WorkResult<T> {
    WorkResult::failed(WorkError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskline_core::{callable_fn, BoxError};

    #[test]
    fn run_delivers_value() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| Ok::<_, BoxError>("done")));
        assert_eq!(task.run("test"), Outcome::Completed);
        assert!(handle.is_finished());
        let result = handle.wait();
        assert!(result.success());
        assert_eq!(result.value(), Some(&"done"));
    }

    #[test]
    fn cancel_before_start_skips_action() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| -> Result<(), BoxError> {
            panic!("must not run")
        }));
        assert!(handle.cancel());
        assert!(handle.is_cancelled());
        assert_eq!(task.run("test"), Outcome::Cancelled);
        let result = handle.wait();
        assert!(!result.success());
        assert!(result.error().unwrap().is_cancelled());
    }

    #[test]
    fn cancel_after_completion_is_refused() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| Ok::<_, BoxError>(1)));
        task.run("test");
        assert!(!handle.cancel());
        assert!(handle.wait().success());
    }

    #[test]
    fn discard_resolves_handle_as_cancelled() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| Ok::<_, BoxError>(1)));
        task.discard();
        assert!(handle.wait().error().unwrap().is_cancelled());
    }

    #[test]
    fn dropped_task_resolves_handle_as_cancelled() {
        let (task, handle) = CallableTask::new(callable_fn(|| Ok::<_, BoxError>(1)));
        drop(task);
        assert!(handle.wait().error().unwrap().is_cancelled());
    }

    #[test]
    fn panicking_callable_becomes_failed_result() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| -> Result<u8, BoxError> {
            panic!("bad input")
        }));
        assert_eq!(task.run("test"), Outcome::Failed);
        let result = handle.wait();
        assert!(!result.success());
        assert!(matches!(result.error(), Some(WorkError::Panicked(m)) if m == "bad input"));
    }

    #[tokio::test]
    async fn handle_is_awaitable() {
        let (mut task, handle) = CallableTask::new(callable_fn(|| Ok::<_, BoxError>(9u64)));
        std::thread::spawn(move || {
            task.run("test");
        });
        let result = handle.await;
        assert_eq!(result.value(), Some(&9));
    }
}
