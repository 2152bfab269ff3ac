//! Remote content API.
//!
//! The Hacker News Firebase API serves one JSON document per node:
//!
//! ```text
//! {base}/item/{id}.json      # story, comment, job, poll, pollopt
//! {base}/user/{id}.json      # user profile with `submitted` ids
//! {base}/topstories.json     # frontier lists (top, new, best, ask, show, job)
//! {base}/maxitem.json        # largest item id
//! {base}/updates.json        # recently changed items and profiles
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlRecord, CrawlerConfig, Frontier, ItemId, Updates, is_valid_user_id};
use crate::utils::http::create_async_client;

/// Read-only view of the remote content graph.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch_item(&self, id: ItemId) -> Result<CrawlRecord>;

    async fn fetch_user(&self, id: &str) -> Result<CrawlRecord>;

    /// Ids currently listed in a frontier category.
    async fn list_frontier(&self, frontier: Frontier) -> Result<Vec<ItemId>>;

    async fn max_item_id(&self) -> Result<ItemId>;

    async fn updates(&self) -> Result<Updates>;
}

/// reqwest-backed client for the Firebase API.
#[derive(Debug, Clone)]
pub struct HnClient {
    client: reqwest::Client,
    base: Url,
}

impl HnClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Self::with_client(client, &config.base_url)
    }

    /// Use an existing client against `base_url`.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        // Url::join drops the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteApi for HnClient {
    async fn fetch_item(&self, id: ItemId) -> Result<CrawlRecord> {
        let value: Value = self
            .get_json(&format!("item/{}.json", id))
            .await
            .map_err(|e| AppError::remote_fetch(format!("item {}", id), e))?;
        CrawlRecord::from_item_json(id, value)
    }

    async fn fetch_user(&self, id: &str) -> Result<CrawlRecord> {
        if !is_valid_user_id(id) {
            return Err(AppError::remote_fetch(format!("user {}", id), "malformed user id"));
        }
        let value: Value = self
            .get_json(&format!("user/{}.json", id))
            .await
            .map_err(|e| AppError::remote_fetch(format!("user {}", id), e))?;
        CrawlRecord::from_user_json(id, value)
    }

    async fn list_frontier(&self, frontier: Frontier) -> Result<Vec<ItemId>> {
        let ids: Option<Vec<ItemId>> = self.get_json(frontier.path()).await?;
        Ok(ids.unwrap_or_default())
    }

    async fn max_item_id(&self) -> Result<ItemId> {
        let max: Option<ItemId> = self.get_json("maxitem.json").await?;
        max.ok_or_else(|| AppError::remote_fetch("maxitem", "empty response"))
    }

    async fn updates(&self) -> Result<Updates> {
        let updates: Option<Updates> = self.get_json("updates.json").await?;
        Ok(updates.unwrap_or_default())
    }
}
