// src/pipeline/update.rs

//! Refresh pipeline: crawl from the nodes the API reports as changed.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{CrawlSummary, NodeId};
use crate::queue::InterruptToken;
use crate::services::{CrawlOptions, Crawler, RemoteApi};
use crate::storage::RecordStorage;
use crate::utils::log;

use super::crawl::print_summary;

/// Re-crawl recently changed items and profiles.
pub async fn run_update(
    api: Arc<dyn RemoteApi>,
    storage: Arc<dyn RecordStorage>,
    options: CrawlOptions,
    interrupt: &InterruptToken,
) -> Result<CrawlSummary> {
    log::header("Crawling recent updates");

    let updates = api.updates().await?;
    log::info(&format!(
        "{} changed item(s), {} changed profile(s)",
        updates.items.len(),
        updates.profiles.len()
    ));

    let seeds: Vec<NodeId> = updates
        .items
        .into_iter()
        .map(NodeId::Item)
        .chain(updates.profiles.into_iter().map(NodeId::User))
        .collect();

    let crawler = Arc::new(Crawler::new(api, storage, options));
    let summary = crawler.run(&seeds, interrupt).await?;

    print_summary("Update", &summary);
    Ok(summary)
}
