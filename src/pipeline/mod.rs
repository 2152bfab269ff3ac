//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Crawl outward from the frontier lists
//! - `run_update`: Crawl outward from the remote updates feed

pub mod crawl;
pub mod update;

pub use crawl::run_crawler;
pub use update::run_update;
