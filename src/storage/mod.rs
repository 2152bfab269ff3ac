//! Storage abstractions for crawled records.
//!
//! ## Directory Structure (local backend)
//!
//! ```text
//! storage/
//! ├── story/
//! │   └── 8863.json
//! ├── comment/
//! ├── user/
//! │   └── dhouston.json
//! └── runs/
//!     └── latest.json     # Summary of the most recent crawl
//! ```

pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CrawlRecord, CrawlSummary, RecordKind, StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Save a record under `(kind, id)`. Overwrites an existing record.
    async fn save(&self, record: &CrawlRecord) -> Result<()>;

    /// Load a record, `None` if it was never saved.
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<CrawlRecord>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Remember the summary of a finished run.
    async fn record_run(&self, summary: &CrawlSummary) -> Result<()>;

    /// Summary of the most recent run, if any.
    async fn last_run(&self) -> Result<Option<CrawlSummary>>;
}

/// Build the backend selected in the configuration.
pub fn from_config(config: &StorageConfig) -> Arc<dyn RecordStorage> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(&config.root_dir)),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    }
}
