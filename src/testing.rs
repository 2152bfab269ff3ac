//! In-memory remote API for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CrawlRecord, Frontier, ItemId, NodeId, Updates};
use crate::services::RemoteApi;

/// Serves a fixed graph and counts every fetch per node.
#[derive(Default)]
pub struct FakeApi {
    nodes: HashMap<NodeId, CrawlRecord>,
    frontiers: HashMap<Frontier, Vec<ItemId>>,
    updates: Updates,
    failing: Vec<NodeId>,
    delay: Duration,
    calls: Mutex<HashMap<NodeId, usize>>,
    order: Mutex<Vec<NodeId>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: CrawlRecord) -> Self {
        self.nodes.insert(record.id.clone(), record);
        self
    }

    pub fn with_frontier(mut self, frontier: Frontier, ids: Vec<ItemId>) -> Self {
        self.frontiers.insert(frontier, ids);
        self
    }

    pub fn with_updates(mut self, updates: Updates) -> Self {
        self.updates = updates;
        self
    }

    /// Make fetches of `id` fail even if a record exists.
    pub fn failing(mut self, id: impl Into<NodeId>) -> Self {
        self.failing.push(id.into());
        self
    }

    /// Delay every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, id: &NodeId) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Every fetched node, in the order the fetches started.
    pub fn fetch_order(&self) -> Vec<NodeId> {
        self.order.lock().unwrap().clone()
    }

    async fn serve(&self, id: NodeId) -> Result<CrawlRecord> {
        *self.calls.lock().unwrap().entry(id.clone()).or_default() += 1;
        self.order.lock().unwrap().push(id.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&id) {
            return Err(AppError::remote_fetch(&id, "synthetic failure"));
        }
        self.nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::remote_fetch(&id, "no such node"))
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_item(&self, id: ItemId) -> Result<CrawlRecord> {
        self.serve(NodeId::Item(id)).await
    }

    async fn fetch_user(&self, id: &str) -> Result<CrawlRecord> {
        self.serve(NodeId::from(id)).await
    }

    async fn list_frontier(&self, frontier: Frontier) -> Result<Vec<ItemId>> {
        Ok(self.frontiers.get(&frontier).cloned().unwrap_or_default())
    }

    async fn max_item_id(&self) -> Result<ItemId> {
        Ok(self
            .nodes
            .keys()
            .filter_map(|id| match id {
                NodeId::Item(n) => Some(*n),
                NodeId::User(_) => None,
            })
            .max()
            .unwrap_or(0))
    }

    async fn updates(&self) -> Result<Updates> {
        Ok(self.updates.clone())
    }
}
