//! Work items and their ordering inside the queue.

use std::cmp::Ordering;

/// A deferred unit of work.
///
/// Priority and enqueue order are assigned by [`WorkQueue::add`](super::WorkQueue::add),
/// so two items built from identical actions are still distinct once queued.
#[derive(Debug, Clone)]
pub struct WorkItem<A> {
    pub action: A,
    pub must_complete: bool,
}

impl<A> WorkItem<A> {
    /// Exploratory work: may be discarded on shutdown.
    pub fn new(action: A) -> Self {
        Self {
            action,
            must_complete: false,
        }
    }

    /// Work whose loss would lose already-fetched data.
    pub fn must_complete(action: A) -> Self {
        Self {
            action,
            must_complete: true,
        }
    }
}

/// Result of offering an item to the queue. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Bounded queue was full; the item is gone for good.
    DroppedFull,
    /// Queue is stopping (exploratory item) or stopped.
    Rejected,
}

/// An item sitting in the pending heap.
#[derive(Debug)]
pub(crate) struct Queued<A> {
    pub item: WorkItem<A>,
    pub priority: u8,
    /// Enqueue sequence number: the tie-break and the item's identity.
    pub seq: u64,
}

impl<A> PartialEq for Queued<A> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<A> Eq for Queued<A> {}

impl<A> PartialOrd for Queued<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Queued<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap pops the lowest (priority, seq) first
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
