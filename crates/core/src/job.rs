//! Job abstractions shared by the worker pool and the scheduler.
//!
//! Two kinds of job exist: [`Work`], a fire-and-forget action, and
//! [`CallableWork`], an action whose outcome is delivered to the caller as a
//! [`WorkResult`]. Both are executed through [`run_guarded`], which turns
//! returned errors and panics into a [`WorkError`] so that a misbehaving job
//! can never take down the thread running it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Error type returned by job actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Errors ──────────────────────────────────────────────────────────

/// Why a job did not complete normally.
#[derive(Debug, Error)]
pub enum WorkError {
    /// The action returned an error.
    #[error("work failed: {0}")]
    Failed(#[source] BoxError),

    /// The action panicked. Holds the panic message when it was a string.
    #[error("work panicked: {0}")]
    Panicked(String),

    /// The job was cancelled or discarded before it started.
    #[error("work cancelled before it started")]
    Cancelled,
}

impl WorkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkError::Cancelled)
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        WorkError::Panicked(message)
    }
}

// ── Job traits ──────────────────────────────────────────────────────

/// An action with no return value.
///
/// Jobs are moved into the executor and run at most once per submission.
/// Repeating timer events run the same `Work` once per firing.
pub trait Work: Send + 'static {
    fn action(&mut self) -> Result<(), BoxError>;

    /// Where this job came from, used in logs and backlog warnings.
    fn origin(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<W: Work + ?Sized> Work for Box<W> {
    fn action(&mut self) -> Result<(), BoxError> {
        (**self).action()
    }

    fn origin(&self) -> &str {
        (**self).origin()
    }
}

/// An action that produces a value.
pub trait CallableWork: Send + 'static {
    type Output: Send + 'static;

    fn action(&mut self) -> Result<Self::Output, BoxError>;

    /// Where this job came from, used in logs and backlog warnings.
    fn origin(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ── Closure adapters ────────────────────────────────────────────────

/// [`Work`] backed by a closure. Built with [`work_fn`].
pub struct WorkFn<F> {
    f: F,
    origin: &'static str,
}

/// Wrap a closure as [`Work`].
pub fn work_fn<F>(f: F) -> WorkFn<F>
where
    F: FnMut() -> Result<(), BoxError> + Send + 'static,
{
    WorkFn {
        f,
        origin: std::any::type_name::<F>(),
    }
}

impl<F> WorkFn<F> {
    /// Override the origin reported in logs.
    pub fn named(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }
}

impl<F> Work for WorkFn<F>
where
    F: FnMut() -> Result<(), BoxError> + Send + 'static,
{
    fn action(&mut self) -> Result<(), BoxError> {
        (self.f)()
    }

    fn origin(&self) -> &str {
        self.origin
    }
}

/// [`CallableWork`] backed by a closure. Built with [`callable_fn`].
pub struct CallableFn<F> {
    f: F,
    origin: &'static str,
}

/// Wrap a closure as [`CallableWork`].
pub fn callable_fn<F, T>(f: F) -> CallableFn<F>
where
    F: FnMut() -> Result<T, BoxError> + Send + 'static,
    T: Send + 'static,
{
    CallableFn {
        f,
        origin: std::any::type_name::<F>(),
    }
}

impl<F> CallableFn<F> {
    /// Override the origin reported in logs.
    pub fn named(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }
}

impl<F, T> CallableWork for CallableFn<F>
where
    F: FnMut() -> Result<T, BoxError> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn action(&mut self) -> Result<T, BoxError> {
        (self.f)()
    }

    fn origin(&self) -> &str {
        self.origin
    }
}

// ── Result ──────────────────────────────────────────────────────────

/// Outcome of a [`CallableWork`] execution.
///
/// `success` is true exactly when `error` is `None`.
pub struct WorkResult<T> {
    success: bool,
    value: Option<T>,
    error: Option<WorkError>,
}

impl<T> WorkResult<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(error: WorkError) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&WorkError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<T, WorkError> {
        match (self.value, self.error) {
            (_, Some(e)) => Err(e),
            (Some(v), None) => Ok(v),
            (None, None) => Err(WorkError::Cancelled),
        }
    }
}

impl<T> From<Result<T, WorkError>> for WorkResult<T> {
    fn from(r: Result<T, WorkError>) -> Self {
        match r {
            Ok(v) => WorkResult::ok(v),
            Err(e) => WorkResult::failed(e),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WorkResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkResult")
            .field("success", &self.success)
            .field("value", &self.value)
            .field("error", &self.error)
            .finish()
    }
}

// ── Guarded execution ───────────────────────────────────────────────

/// Run a [`Work`] action, converting errors and panics into [`WorkError`].
pub fn run_guarded(work: &mut dyn Work) -> Result<(), WorkError> {
    guard(|| work.action())
}

/// Run a [`CallableWork`] action, converting errors and panics into a failed
/// [`WorkResult`].
pub fn call_guarded<C: CallableWork + ?Sized>(work: &mut C) -> WorkResult<C::Output> {
    guard(|| work.action()).into()
}

fn guard<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, WorkError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(WorkError::Failed(e)),
        Err(payload) => Err(WorkError::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    struct Counter {
        hits: usize,
    }

    impl Work for Counter {
        fn action(&mut self) -> Result<(), BoxError> {
            self.hits += 1;
            Ok(())
        }
    }

    #[test]
    fn run_guarded_ok() {
        let mut c = Counter { hits: 0 };
        assert!(run_guarded(&mut c).is_ok());
        assert!(run_guarded(&mut c).is_ok());
        assert_eq!(c.hits, 2);
    }

    #[test]
    fn run_guarded_keeps_returned_error() {
        let mut w = work_fn(|| Err(Box::new(Boom) as BoxError));
        match run_guarded(&mut w) {
            Err(WorkError::Failed(e)) => assert!(e.downcast_ref::<Boom>().is_some()),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn run_guarded_catches_panic() {
        let mut w = work_fn(|| panic!("worker exploded"));
        match run_guarded(&mut w) {
            Err(WorkError::Panicked(msg)) => assert_eq!(msg, "worker exploded"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[test]
    fn call_guarded_success_and_failure() {
        let mut ok = callable_fn(|| Ok::<_, BoxError>(42));
        let r = call_guarded(&mut ok);
        assert!(r.success());
        assert_eq!(r.value(), Some(&42));
        assert!(r.error().is_none());

        let mut bad = callable_fn(|| -> Result<u32, BoxError> { Err("no value".into()) });
        let r = call_guarded(&mut bad);
        assert!(!r.success());
        assert!(r.value().is_none());
        assert!(matches!(r.error(), Some(WorkError::Failed(_))));
    }

    #[test]
    fn call_guarded_panic_with_formatted_message() {
        let mut bad = callable_fn(|| -> Result<(), BoxError> { panic!("index {} out of range", 7) });
        let r = call_guarded(&mut bad);
        assert!(!r.success());
        match r.error() {
            Some(WorkError::Panicked(msg)) => assert_eq!(msg, "index 7 out of range"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[test]
    fn into_result_round_trip() {
        assert_eq!(WorkResult::ok("v").into_result().unwrap(), "v");
        let err = WorkResult::<()>::failed(WorkError::Cancelled).into_result().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn origin_defaults_and_overrides() {
        let c = Counter { hits: 0 };
        assert!(c.origin().ends_with("Counter"));

        let w = work_fn(|| Ok(())).named("cache-listener");
        assert_eq!(w.origin(), "cache-listener");

        let boxed: Box<dyn Work> = Box::new(Counter { hits: 0 });
        assert!(boxed.origin().ends_with("Counter"));
    }
}
