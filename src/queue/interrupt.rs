//! Interrupt token handed to `WorkQueue::run`.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts operator interrupts (e.g. Ctrl-C) for a run.
///
/// The first interrupt seen by a run triggers its shutdown policy; one more
/// while that shutdown drains forces a cancel. Signal wiring lives with the
/// caller.
#[derive(Debug, Default)]
pub struct InterruptToken {
    count: AtomicUsize,
    notify: Notify,
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one interrupt and wake everyone waiting on the token.
    pub fn interrupt(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Interrupts received so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolve once at least `target` interrupts have been received.
    pub async fn reached(&self, target: usize) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count() >= target {
                return;
            }
            notified.await;
        }
    }
}
