use std::sync::Arc;
use std::time::Duration;

use taskline_core::{PoolConfig, TasklineError};

use crate::backlog::{BacklogObserver, LogBacklogObserver};

use super::WorkerPool;

const MIN_SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fluent builder for a [`WorkerPool`].
///
/// # Example
/// ```ignore
/// let pool = WorkerPool::builder("listener-executor")
///     .workers(4)
///     .backlog_threshold(500)
///     .build()?;
/// ```
pub struct WorkerPoolBuilder {
    pub(super) name: String,
    pub(super) workers: usize,
    pub(super) backlog_threshold: usize,
    pub(super) shutdown_poll_interval: Duration,
    pub(super) observer: Arc<dyn BacklogObserver>,
}

impl WorkerPoolBuilder {
    /// Create a builder with one worker and the default thresholds.
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = PoolConfig::default();
        Self {
            name: name.into(),
            workers: defaults.workers,
            backlog_threshold: defaults.backlog_threshold,
            shutdown_poll_interval: defaults.shutdown_poll_interval(),
            observer: Arc::new(LogBacklogObserver),
        }
    }

    /// Start from a [`PoolConfig`].
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.name.clone())
            .workers(config.resolved_workers())
            .backlog_threshold(config.backlog_threshold)
            .shutdown_poll_interval(config.shutdown_poll_interval())
    }

    /// Number of worker threads (minimum 1).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Queue depth above which the backlog observer is notified (default: 1000).
    pub fn backlog_threshold(mut self, threshold: usize) -> Self {
        self.backlog_threshold = threshold;
        self
    }

    /// Interval between progress reports while `stop` waits (default: 2s,
    /// minimum 10ms).
    pub fn shutdown_poll_interval(mut self, interval: Duration) -> Self {
        self.shutdown_poll_interval = interval.max(MIN_SHUTDOWN_POLL_INTERVAL);
        self
    }

    /// Replace the default logging backlog observer.
    pub fn observer(mut self, observer: impl BacklogObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Spawn the worker threads.
    pub fn build(self) -> Result<WorkerPool, TasklineError> {
        WorkerPool::start(self)
    }
}
