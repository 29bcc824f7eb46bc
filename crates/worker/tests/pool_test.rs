//! Integration tests for callable submission through the public pool API.
//!
//! Verifies that every submitted callable resolves to a `WorkResult`, that
//! failures keep the original error, and that handles work from both
//! blocking and async callers.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskline_worker::{
    callable_fn, BoxError, CallableWork, Lifecycle, Termination, WorkError, WorkerPool,
};

#[derive(Debug)]
struct CacheMiss {
    key: String,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache miss for {}", self.key)
    }
}

impl std::error::Error for CacheMiss {}

/// A named callable, the way a listener container would submit one.
struct LoadEntry {
    key: String,
    loads: Arc<AtomicUsize>,
}

impl CallableWork for LoadEntry {
    type Output = String;

    fn action(&mut self) -> Result<String, BoxError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.key.starts_with("missing") {
            return Err(Box::new(CacheMiss {
                key: self.key.clone(),
            }));
        }
        Ok(format!("value-of-{}", self.key))
    }
}

#[test]
fn callable_success_resolves_with_value() {
    let pool = WorkerPool::builder("loader").workers(2).build().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));

    let handle = pool
        .submit_callable(LoadEntry {
            key: "user:1".into(),
            loads: Arc::clone(&loads),
        })
        .unwrap();

    let result = handle.wait();
    assert!(result.success());
    assert!(result.error().is_none());
    assert_eq!(result.value().map(String::as_str), Some("value-of-user:1"));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn callable_error_is_delivered_not_thrown() {
    let pool = WorkerPool::new("loader").unwrap();
    let loads = Arc::new(AtomicUsize::new(0));

    let handle = pool
        .submit_callable(LoadEntry {
            key: "missing:7".into(),
            loads: Arc::clone(&loads),
        })
        .unwrap();

    let result = handle.wait();
    assert!(!result.success());
    assert!(result.value().is_none());
    match result.error() {
        Some(WorkError::Failed(source)) => {
            let miss = source.downcast_ref::<CacheMiss>().expect("original error preserved");
            assert_eq!(miss.key, "missing:7");
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // The worker survives and keeps serving.
    let again = pool
        .submit_callable(callable_fn(|| Ok::<_, BoxError>(5)))
        .unwrap();
    assert_eq!(again.wait().into_result().unwrap(), 5);
    assert_eq!(pool.stats().failed, 1);
}

#[test]
fn every_handle_resolves_under_load() {
    let pool = WorkerPool::builder("bulk").workers(4).build().unwrap();

    let handles: Vec<_> = (0..100u64)
        .map(|i| {
            pool.submit_callable(callable_fn(move || {
                if i % 10 == 0 {
                    Err(format!("job {i} failed").into())
                } else {
                    Ok(i * 2)
                }
            }))
            .unwrap()
        })
        .collect();

    let mut ok = 0;
    let mut failed = 0;
    for handle in handles {
        let result = handle.wait();
        if result.success() {
            ok += 1;
        } else {
            failed += 1;
        }
    }
    assert_eq!(ok, 90);
    assert_eq!(failed, 10);
    assert_eq!(pool.stop(false), Termination::Complete);
}

#[tokio::test]
async fn handles_can_be_awaited() {
    let pool = WorkerPool::builder("async-caller").workers(2).build().unwrap();

    let a = pool
        .submit_callable(callable_fn(|| Ok::<_, BoxError>("a")))
        .unwrap();
    let b = pool
        .submit_callable(callable_fn(|| -> Result<&'static str, BoxError> {
            panic!("listener blew up")
        }))
        .unwrap();

    let (a, b) = (a.await, b.await);
    assert_eq!(a.value(), Some(&"a"));
    assert!(matches!(b.error(), Some(WorkError::Panicked(_))));
}

#[test]
fn stats_serialize_for_status_reports() {
    let pool = WorkerPool::builder("reported").workers(2).build().unwrap();
    pool.submit_callable(callable_fn(|| Ok::<_, BoxError>(())))
        .unwrap()
        .wait();
    pool.stop(false);

    let stats = pool.stats();
    assert_eq!(stats.lifecycle, Lifecycle::Stopped);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["name"], "reported");
    assert_eq!(json["workers"], 2);
    assert_eq!(json["completed"], 1);
    assert_eq!(json["lifecycle"], "Stopped");
}
