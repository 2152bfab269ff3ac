//! In-memory storage, for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CrawlRecord, CrawlSummary, RecordKind};
use crate::storage::RecordStorage;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<(RecordKind, String), CrawlRecord>,
    saves: usize,
    last_run: Option<CrawlSummary>,
}

/// Records kept in a map keyed by `(kind, id)`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total `save` calls, overwrites included.
    pub fn save_calls(&self) -> usize {
        self.lock().saves
    }
}

#[async_trait]
impl RecordStorage for MemoryStorage {
    async fn save(&self, record: &CrawlRecord) -> Result<()> {
        let mut inner = self.lock();
        inner.saves += 1;
        inner.records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<CrawlRecord>> {
        Ok(self.lock().records.get(&(kind, id.to_string())).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock().records.len())
    }

    async fn record_run(&self, summary: &CrawlSummary) -> Result<()> {
        self.lock().last_run = Some(summary.clone());
        Ok(())
    }

    async fn last_run(&self) -> Result<Option<CrawlSummary>> {
        Ok(self.lock().last_run.clone())
    }
}
