//! Service layer for the crawler application.
//!
//! This module contains:
//! - The remote API seam and its HTTP client (`RemoteApi`, `HnClient`)
//! - The per-run visited set (`VisitedLedger`)
//! - The traversal itself (`Crawler`)

mod api;
pub mod crawler;
mod ledger;

pub use api::{HnClient, RemoteApi};
pub use crawler::{CrawlAction, CrawlOptions, Crawler};
pub use ledger::VisitedLedger;
