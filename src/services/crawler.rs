//! Graph traversal on top of the work queue.
//!
//! Every fetched node is persisted through a must-complete item, then fans
//! out to its author, parent and children as exploratory items. The
//! [`VisitedLedger`] guarantees each node is fetched at most once per run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::models::{CrawlRecord, CrawlSummary, ItemId, NodeId, QueueConfig};
use crate::queue::{Admission, Executor, InterruptToken, ShutdownPolicy, WorkItem, WorkQueue};
use crate::services::{RemoteApi, VisitedLedger};
use crate::storage::RecordStorage;

/// Queue priorities; lower runs first.
///
/// Seeds run before any fan-out; saves run before everything.
pub mod priority {
    pub const PERSIST: u8 = 0;
    pub const SEED: u8 = 1;
    pub const AUTHOR: u8 = 2;
    pub const PARENT: u8 = 3;
    pub const CHILD: u8 = 4;
}

/// What a crawl work item does.
#[derive(Debug, Clone)]
pub enum CrawlAction {
    FetchItem(ItemId),
    FetchUser(String),
    Persist(CrawlRecord),
}

impl CrawlAction {
    /// Node this action would fetch, if it is a fetch.
    fn target(&self) -> Option<NodeId> {
        match self {
            CrawlAction::FetchItem(id) => Some(NodeId::Item(*id)),
            CrawlAction::FetchUser(name) => Some(NodeId::User(name.clone())),
            CrawlAction::Persist(_) => None,
        }
    }
}

impl From<NodeId> for CrawlAction {
    fn from(id: NodeId) -> Self {
        match id {
            NodeId::Item(id) => CrawlAction::FetchItem(id),
            NodeId::User(name) => CrawlAction::FetchUser(name),
        }
    }
}

impl fmt::Display for CrawlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlAction::FetchItem(id) => write!(f, "fetch item {}", id),
            CrawlAction::FetchUser(name) => write!(f, "fetch user {}", name),
            CrawlAction::Persist(record) => write!(f, "persist {}", record.id),
        }
    }
}

/// Runtime knobs for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub workers: usize,
    pub capacity: usize,
    pub timeout: Option<Duration>,
    pub policy: ShutdownPolicy,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            capacity: 0,
            timeout: None,
            policy: ShutdownPolicy::default(),
        }
    }
}

impl From<&QueueConfig> for CrawlOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            workers: config.workers,
            capacity: config.capacity,
            timeout: config.run_timeout(),
            policy: config.shutdown_policy,
        }
    }
}

/// One crawl run: a queue, a ledger and the counters that end up in the
/// [`CrawlSummary`].
pub struct Crawler {
    api: Arc<dyn RemoteApi>,
    storage: Arc<dyn RecordStorage>,
    queue: Arc<WorkQueue<CrawlAction>>,
    visited: VisitedLedger,
    workers: usize,
    timeout: Option<Duration>,
    saved: AtomicUsize,
    fetch_failures: AtomicUsize,
    persist_failures: AtomicUsize,
}

impl Crawler {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Arc<dyn RecordStorage>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            api,
            storage,
            queue: Arc::new(WorkQueue::new(options.capacity, options.policy)),
            visited: VisitedLedger::new(),
            workers: options.workers.max(1),
            timeout: options.timeout,
            saved: AtomicUsize::new(0),
            fetch_failures: AtomicUsize::new(0),
            persist_failures: AtomicUsize::new(0),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue<CrawlAction>> {
        &self.queue
    }

    pub fn visited(&self) -> &VisitedLedger {
        &self.visited
    }

    /// Stop the crawl now; pending work is abandoned.
    pub fn cancel(&self) {
        self.queue.cancel();
    }

    /// Crawl outward from `seeds` until the queue stops.
    pub async fn run(
        self: &Arc<Self>,
        seeds: &[NodeId],
        interrupt: &InterruptToken,
    ) -> Result<CrawlSummary> {
        let started_at = Utc::now();
        let started = Instant::now();

        for seed in seeds {
            self.queue
                .add(WorkItem::new(CrawlAction::from(seed.clone())), priority::SEED);
        }
        log::info!(
            "Crawl seeded with {} node(s), shutdown policy {}",
            seeds.len(),
            self.queue.policy()
        );

        let executor: Arc<dyn Executor<CrawlAction>> = Arc::clone(self) as _;
        let report = self
            .queue
            .run(executor, self.workers, self.timeout, interrupt)
            .await?;
        if !seeds.is_empty() && self.visited.is_empty() {
            log::warn!("Crawl stopped before any node was fetched");
        }

        let summary = CrawlSummary {
            visited_count: self.visited.len(),
            saved_count: self.saved.load(Ordering::SeqCst),
            fetch_failures: self.fetch_failures.load(Ordering::SeqCst),
            persist_failures: self.persist_failures.load(Ordering::SeqCst),
            elapsed_secs: started.elapsed().as_secs_f64(),
            started_at,
            finished_at: Utc::now(),
            queue: report,
        };

        if let Err(e) = self.storage.record_run(&summary).await {
            log::warn!("Failed to record run summary: {}", e);
        }

        Ok(summary)
    }

    async fn fetch_item(&self, id: ItemId) -> Result<()> {
        if !self.visited.claim(&NodeId::Item(id)) {
            log::trace!("item {} already visited", id);
            return Ok(());
        }

        let record = self.api.fetch_item(id).await.inspect_err(|_| {
            self.fetch_failures.fetch_add(1, Ordering::SeqCst);
        })?;

        let by = record.by.clone();
        let parent = record.parent;
        let kids = record.kids.clone();
        self.persist_later(record);

        if let Some(author) = by {
            self.explore(CrawlAction::FetchUser(author), priority::AUTHOR);
        }
        if let Some(parent) = parent {
            self.explore(CrawlAction::FetchItem(parent), priority::PARENT);
        }
        for kid in kids {
            self.explore(CrawlAction::FetchItem(kid), priority::CHILD);
        }
        Ok(())
    }

    async fn fetch_user(&self, id: String) -> Result<()> {
        if !self.visited.claim(&NodeId::User(id.clone())) {
            log::trace!("user {} already visited", id);
            return Ok(());
        }

        let record = self.api.fetch_user(&id).await.inspect_err(|_| {
            self.fetch_failures.fetch_add(1, Ordering::SeqCst);
        })?;

        let submitted = record.submitted.clone();
        self.persist_later(record);

        for item in submitted {
            self.explore(CrawlAction::FetchItem(item), priority::CHILD);
        }
        Ok(())
    }

    async fn persist(&self, record: CrawlRecord) -> Result<()> {
        match self.storage.save(&record).await {
            Ok(()) => {
                self.saved.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.persist_failures.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn persist_later(&self, record: CrawlRecord) {
        let id = record.id.clone();
        let admission = self
            .queue
            .add(WorkItem::must_complete(CrawlAction::Persist(record)), priority::PERSIST);
        if admission != Admission::Queued {
            self.persist_failures.fetch_add(1, Ordering::SeqCst);
            log::error!("{} fetched but not queued for saving ({:?})", id, admission);
        }
    }

    /// Enqueue a fetch unless its node is already in the ledger.
    fn explore(&self, action: CrawlAction, priority: u8) {
        if let Some(node) = action.target() {
            if self.visited.contains(&node) {
                return;
            }
        }
        self.queue.add(WorkItem::new(action), priority);
    }
}

#[async_trait]
impl Executor<CrawlAction> for Crawler {
    async fn execute(&self, action: CrawlAction) -> Result<()> {
        match action {
            CrawlAction::FetchItem(id) => self.fetch_item(id).await,
            CrawlAction::FetchUser(id) => self.fetch_user(id).await,
            CrawlAction::Persist(record) => self.persist(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::{CrawlSummary, RecordKind};
    use crate::queue::StopTrigger;
    use crate::storage::MemoryStorage;
    use crate::testing::FakeApi;

    fn crawler(
        api: FakeApi,
        options: CrawlOptions,
    ) -> (Arc<Crawler>, Arc<FakeApi>, Arc<MemoryStorage>) {
        let api = Arc::new(api);
        let storage = Arc::new(MemoryStorage::new());
        let crawler = Arc::new(Crawler::new(api.clone(), storage.clone(), options));
        (crawler, api, storage)
    }

    fn finish(workers: usize) -> CrawlOptions {
        CrawlOptions {
            workers,
            policy: ShutdownPolicy::Finish,
            ..CrawlOptions::default()
        }
    }

    fn seed_graph() -> FakeApi {
        FakeApi::new()
            .with_record(
                CrawlRecord::item(1, RecordKind::Story)
                    .with_by("u1")
                    .with_kids(vec![3]),
            )
            .with_record(CrawlRecord::item(2, RecordKind::Story))
            .with_record(CrawlRecord::item(3, RecordKind::Comment))
            .with_record(CrawlRecord::user("u1"))
    }

    #[tokio::test]
    async fn test_two_seeds_visit_author_and_child() {
        let (crawler, api, storage) = crawler(seed_graph(), finish(4));

        let summary = crawler
            .run(&[NodeId::Item(1), NodeId::Item(2)], &InterruptToken::new())
            .await
            .unwrap();

        let expected: BTreeSet<NodeId> = [
            NodeId::Item(1),
            NodeId::Item(2),
            NodeId::Item(3),
            NodeId::from("u1"),
        ]
        .into_iter()
        .collect();
        assert_eq!(crawler.visited().snapshot(), expected);
        assert_eq!(storage.save_calls(), 4);
        assert_eq!(summary.saved_count, 4);
        assert_eq!(summary.fetch_failures, 0);
        assert_eq!(summary.persist_failures, 0);
        assert_eq!(summary.queue.stats.failed, 0);
        assert_eq!(api.total_calls(), 4);
        assert!(!summary.lost_data());

        let recorded = storage.last_run().await.unwrap().unwrap();
        assert_eq!(recorded.saved_count, 4);
    }

    #[tokio::test]
    async fn test_seeds_are_fetched_before_fan_out() {
        let api = FakeApi::new()
            .with_record(
                CrawlRecord::item(1, RecordKind::Comment)
                    .with_by("u1")
                    .with_parent(9)
                    .with_kids(vec![3]),
            )
            .with_record(CrawlRecord::item(2, RecordKind::Story))
            .with_record(CrawlRecord::item(3, RecordKind::Comment))
            .with_record(CrawlRecord::item(9, RecordKind::Story))
            .with_record(CrawlRecord::user("u1"));
        let (crawler, api, _storage) = crawler(api, finish(1));

        crawler
            .run(&[NodeId::Item(1), NodeId::Item(2)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(
            api.fetch_order(),
            vec![
                NodeId::Item(1),
                NodeId::Item(2),
                NodeId::from("u1"),
                NodeId::Item(9),
                NodeId::Item(3),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_item_is_idempotent() {
        let (crawler, api, _storage) = crawler(seed_graph(), finish(1));

        crawler.fetch_item(2).await.unwrap();
        let pending = crawler.queue().pending_len();
        assert_eq!(pending, 1, "one persist queued");

        crawler.fetch_item(2).await.unwrap();
        assert_eq!(api.calls(&NodeId::Item(2)), 1);
        assert_eq!(crawler.queue().pending_len(), pending);
        assert_eq!(crawler.queue().must_complete_len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_skips_visited_nodes() {
        let (crawler, _api, _storage) = crawler(seed_graph(), finish(1));

        assert!(crawler.visited().claim(&NodeId::from("u1")));
        crawler.fetch_item(1).await.unwrap();

        // persist(1) and fetch(3); the author is already claimed
        assert_eq!(crawler.queue().pending_len(), 2);
    }

    /// 50 items: item n has children 2n+1 and 2n+2 (when < 50), every item
    /// except 0 points back at its parent, and every item is by one of
    /// five users who list everything they submitted.
    fn dag() -> FakeApi {
        let mut api = FakeApi::new();
        let mut submitted: Vec<Vec<ItemId>> = vec![Vec::new(); 5];
        for n in 0..50u64 {
            let author = (n % 5) as usize;
            submitted[author].push(n);

            let kids: Vec<ItemId> = [2 * n + 1, 2 * n + 2]
                .into_iter()
                .filter(|k| *k < 50)
                .collect();
            let mut record = CrawlRecord::item(n, RecordKind::Comment)
                .with_by(format!("user{}", author))
                .with_kids(kids);
            if n > 0 {
                record = record.with_parent((n - 1) / 2);
            }
            api = api.with_record(record);
        }
        for (i, items) in submitted.into_iter().enumerate() {
            api = api.with_record(CrawlRecord::user(format!("user{}", i)).with_submitted(items));
        }
        api
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dag_with_cycles_visits_every_node_once() {
        let api = dag().with_delay(Duration::from_millis(1));
        let (crawler, api, storage) = crawler(api, finish(8));

        let summary = crawler
            .run(&[NodeId::Item(17)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(summary.queue.trigger, StopTrigger::Drained);
        assert_eq!(summary.visited_count, 55);
        assert_eq!(summary.saved_count, 55);
        assert_eq!(storage.count().await.unwrap(), 55);
        for n in 0..50u64 {
            assert_eq!(api.calls(&NodeId::Item(n)), 1, "item {} fetched once", n);
        }
        for i in 0..5 {
            assert_eq!(api.calls(&NodeId::User(format!("user{}", i))), 1);
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_abandons_branch_only() {
        let api = seed_graph().failing(1u64);
        let (crawler, api, storage) = crawler(api, finish(2));

        let summary = crawler
            .run(&[NodeId::Item(1), NodeId::Item(2)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.saved_count, 1);
        assert_eq!(summary.queue.stats.failed, 1);
        // the failed id stays claimed, its children were never discovered
        assert!(crawler.visited().contains(&NodeId::Item(1)));
        assert_eq!(api.calls(&NodeId::Item(3)), 0);
        assert!(storage.load(RecordKind::Story, "2").await.unwrap().is_some());
    }

    struct BrokenStorage;

    #[async_trait]
    impl RecordStorage for BrokenStorage {
        async fn save(&self, record: &CrawlRecord) -> Result<()> {
            Err(AppError::persist(&record.id, "disk full"))
        }

        async fn load(&self, _kind: RecordKind, _id: &str) -> Result<Option<CrawlRecord>> {
            Ok(None)
        }

        async fn count(&self) -> Result<usize> {
            Ok(0)
        }

        async fn record_run(&self, _summary: &CrawlSummary) -> Result<()> {
            Err(AppError::persist("run", "disk full"))
        }

        async fn last_run(&self) -> Result<Option<CrawlSummary>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_persist_failures_are_counted() {
        let crawler = Arc::new(Crawler::new(
            Arc::new(seed_graph()),
            Arc::new(BrokenStorage),
            finish(2),
        ));

        let summary = crawler
            .run(&[NodeId::Item(2)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(summary.saved_count, 0);
        assert_eq!(summary.persist_failures, 1);
        assert!(summary.lost_data());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_fetched_records() {
        let options = CrawlOptions {
            workers: 2,
            timeout: Some(Duration::from_millis(25)),
            policy: ShutdownPolicy::CompletePriority,
            ..CrawlOptions::default()
        };
        let api = dag().with_delay(Duration::from_millis(10));
        let (crawler, _api, storage) = crawler(api, options);

        let summary = crawler
            .run(&[NodeId::Item(0)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(summary.queue.trigger, StopTrigger::Timeout);
        assert!(summary.visited_count < 55);
        assert_eq!(summary.queue.unfinished_must_complete, 0);
        assert_eq!(summary.persist_failures, 0);
        // every fetched record reached storage
        let fetched = summary.visited_count - summary.fetch_failures;
        assert_eq!(storage.count().await.unwrap(), fetched);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_fetches_nothing() {
        let (crawler, api, storage) = crawler(seed_graph(), finish(2));
        crawler.cancel();

        let summary = crawler
            .run(&[NodeId::Item(1)], &InterruptToken::new())
            .await
            .unwrap();

        assert_eq!(summary.queue.trigger, StopTrigger::Cancelled);
        assert_eq!(summary.visited_count, 0);
        assert!(crawler.visited().is_empty());
        assert_eq!(api.total_calls(), 0);
        assert_eq!(storage.save_calls(), 0);
        // the seed was refused by the stopped queue
        assert_eq!(summary.queue.stats.rejected_stopping, 1);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(CrawlAction::FetchItem(8863).to_string(), "fetch item 8863");
        assert_eq!(CrawlAction::FetchUser("pg".into()).to_string(), "fetch user pg");
        assert_eq!(
            CrawlAction::Persist(CrawlRecord::user("pg")).to_string(),
            "persist user pg"
        );
    }
}
