// src/models/summary.rs

//! Outcome of one crawl run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::RunReport;

/// What a crawl run did, as returned to the caller and recorded by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Distinct nodes claimed in the visited ledger
    pub visited_count: usize,

    /// Records successfully written to storage
    pub saved_count: usize,

    /// Nodes whose fetch failed (branch abandoned)
    pub fetch_failures: usize,

    /// Records that were fetched but could not be saved
    pub persist_failures: usize,

    pub elapsed_secs: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// How the work queue stopped
    pub queue: RunReport,
}

impl CrawlSummary {
    /// Whether anything fetched was lost before reaching storage.
    pub fn lost_data(&self) -> bool {
        self.persist_failures > 0 || self.queue.unfinished_must_complete > 0
    }
}
