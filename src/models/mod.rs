// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains the data structures shared by the queue, the
//! traversal and the persistence layer.

mod config;
mod frontier;
mod record;
mod summary;

// Re-export all public types
pub use config::{Config, CrawlerConfig, LoggingConfig, QueueConfig, StorageBackend, StorageConfig};
pub use frontier::Frontier;
pub use record::{CrawlRecord, ItemId, NodeId, RecordKind, is_valid_user_id};
pub use summary::CrawlSummary;

/// Ids the remote API reports as recently changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Updates {
    #[serde(default)]
    pub items: Vec<ItemId>,
    #[serde(default)]
    pub profiles: Vec<String>,
}
