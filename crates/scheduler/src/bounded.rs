use std::sync::Arc;

use taskline_core::{BoxError, Work};

use crate::handle::EntryShared;

/// Wraps an action so its entry cancels itself after `count` firings.
///
/// Failed firings count toward the budget. The cancel happens from inside
/// the last firing, so the lane never reschedules the entry.
pub(crate) struct BoundedEvent {
    inner: Box<dyn Work>,
    remaining: u32,
    entry: Arc<EntryShared>,
}

impl BoundedEvent {
    pub(crate) fn new(inner: Box<dyn Work>, count: u32, entry: Arc<EntryShared>) -> Self {
        Self {
            inner,
            remaining: count,
            entry,
        }
    }
}

impl Work for BoundedEvent {
    fn action(&mut self) -> Result<(), BoxError> {
        if self.remaining == 0 {
            self.entry.cancel();
            return Ok(());
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.entry.cancel();
        }
        self.inner.action()
    }

    fn origin(&self) -> &str {
        self.inner.origin()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use taskline_core::work_fn;

    use super::*;
    use crate::handle::EntryState;

    #[test]
    fn cancels_entry_on_last_firing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let entry = Arc::new(EntryShared::new(1));
        let mut bounded = BoundedEvent::new(
            Box::new(work_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
            2,
            Arc::clone(&entry),
        );

        assert!(entry.begin_firing());
        bounded.action().unwrap();
        assert!(entry.end_firing(true));
        assert_eq!(entry.state(), EntryState::Pending);

        assert!(entry.begin_firing());
        bounded.action().unwrap();
        assert!(!entry.end_firing(true));
        assert_eq!(entry.state(), EntryState::Cancelled);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_firing_still_counts() {
        let entry = Arc::new(EntryShared::new(2));
        let mut bounded = BoundedEvent::new(
            Box::new(work_fn(|| Err("tick failed".into())).named("flaky")),
            1,
            Arc::clone(&entry),
        );

        assert_eq!(bounded.origin(), "flaky");
        assert!(bounded.action().is_err());
        assert!(entry.is_cancelled());
    }
}
