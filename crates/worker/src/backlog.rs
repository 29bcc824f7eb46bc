//! Queue-depth observation.
//!
//! After every execution the pool samples its queue depth. When the depth
//! exceeds the configured threshold the pool notifies a [`BacklogObserver`].
//! The signal is informational only: submissions are never blocked or dropped.

use tracing::warn;

/// Receives backlog notifications from a pool.
pub trait BacklogObserver: Send + Sync {
    /// `origin` identifies the job whose completion triggered the sample.
    fn on_backlog(&self, pool: &str, origin: &str, depth: usize);
}

impl<F> BacklogObserver for F
where
    F: Fn(&str, &str, usize) + Send + Sync,
{
    fn on_backlog(&self, pool: &str, origin: &str, depth: usize) {
        self(pool, origin, depth)
    }
}

/// Default observer: emits a `warn` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBacklogObserver;

impl BacklogObserver for LogBacklogObserver {
    fn on_backlog(&self, pool: &str, origin: &str, depth: usize) {
        warn!(pool = %pool, origin = %origin, depth, "worker queue size over warning length");
    }
}
