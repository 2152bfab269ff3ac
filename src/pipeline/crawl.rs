// src/pipeline/crawl.rs

//! Frontier crawl pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::{AppError, Result};
use crate::models::{CrawlSummary, Frontier, NodeId};
use crate::queue::InterruptToken;
use crate::services::{CrawlOptions, Crawler, RemoteApi};
use crate::storage::RecordStorage;
use crate::utils::log;

/// Crawl everything reachable from the current frontier lists.
pub async fn run_crawler(
    api: Arc<dyn RemoteApi>,
    storage: Arc<dyn RecordStorage>,
    options: CrawlOptions,
    frontier: &[Frontier],
    interrupt: &InterruptToken,
) -> Result<CrawlSummary> {
    let names: Vec<&str> = frontier.iter().map(Frontier::as_str).collect();
    log::header(&format!("Crawling from frontier: {}", names.join(", ")));

    log::step(1, 2, "Fetching frontier lists");
    let seeds = gather_seeds(api.as_ref(), frontier).await?;
    log::info(&format!("{} distinct seed item(s)", seeds.len()));

    log::step(2, 2, "Crawling");
    let crawler = Arc::new(Crawler::new(api, storage, options));
    let summary = crawler.run(&seeds, interrupt).await?;

    print_summary("Crawl", &summary);
    Ok(summary)
}

/// Union of all frontier lists. A list that fails to load is skipped unless
/// every list fails.
async fn gather_seeds(api: &dyn RemoteApi, frontier: &[Frontier]) -> Result<Vec<NodeId>> {
    let lists = join_all(frontier.iter().map(|f| api.list_frontier(*f))).await;

    let mut ids = BTreeSet::new();
    let mut first_error = None;
    let mut loaded = 0;
    for (category, list) in frontier.iter().zip(lists) {
        match list {
            Ok(list) => {
                log::sub_item(&format!("{}: {} id(s)", category, list.len()));
                ids.extend(list);
                loaded += 1;
            }
            Err(e) => {
                log::warn(&format!("Frontier '{}' unavailable: {}", category, e));
                first_error.get_or_insert(e);
            }
        }
    }

    if loaded == 0 {
        return Err(first_error
            .unwrap_or_else(|| AppError::config("no frontier categories given")));
    }
    Ok(ids.into_iter().map(NodeId::Item).collect())
}

/// Print the outcome of a crawl run.
pub(crate) fn print_summary(title: &str, summary: &CrawlSummary) {
    let report = &summary.queue;
    log::summary(
        title,
        &[
            ("Stopped by", format!("{:?}", report.trigger)),
            (
                "Shutdown policy",
                report
                    .policy
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Visited", summary.visited_count.to_string()),
            ("Saved", summary.saved_count.to_string()),
            ("Fetch failures", summary.fetch_failures.to_string()),
            ("Persist failures", summary.persist_failures.to_string()),
            ("Dropped (queue full)", report.stats.dropped_full.to_string()),
            ("Discarded on shutdown", report.stats.discarded.to_string()),
            ("Elapsed", format!("{:.2}s", summary.elapsed_secs)),
        ],
    );

    if report.escalated {
        log::warn("Interrupt forced a cancel; in-flight work was not awaited");
    }
    if summary.lost_data() {
        log::warn(&format!(
            "{} fetched record(s) were not saved",
            summary.persist_failures + report.unfinished_must_complete
        ));
    } else {
        log::success("All fetched records saved");
    }
}
