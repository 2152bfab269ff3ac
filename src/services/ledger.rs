//! Visited-node ledger shared by all workers of a crawl.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::NodeId;

/// Set of node ids claimed during one crawl. Never shrinks.
#[derive(Debug, Default)]
pub struct VisitedLedger {
    seen: Mutex<HashSet<NodeId>>,
}

impl VisitedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-insert in one step. Returns `true` for the first caller only.
    pub fn claim(&self, id: &NodeId) -> bool {
        let mut seen = self.lock();
        if seen.contains(id) {
            return false;
        }
        seen.insert(id.clone())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted copy of every claimed id.
    pub fn snapshot(&self) -> BTreeSet<NodeId> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_claim_once() {
        let ledger = VisitedLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.claim(&NodeId::Item(1)));
        assert!(!ledger.claim(&NodeId::Item(1)));
        assert!(ledger.claim(&NodeId::from("1")));
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let ledger = Arc::new(VisitedLedger::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.claim(&NodeId::Item(42)) })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ledger.snapshot().into_iter().collect::<Vec<_>>(), vec![NodeId::Item(42)]);
    }
}
