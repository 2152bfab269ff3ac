//! Local filesystem storage implementation.
//!
//! Every record is one pretty-printed JSON file at `{root}/{kind}/{id}.json`.
//! Writes go to a temp file first and are renamed into place, so a crash
//! mid-write never leaves a truncated record behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlRecord, CrawlSummary, RecordKind};
use crate::storage::RecordStorage;

const LATEST_RUN_KEY: &str = "runs/latest.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// The id must stay a single file name under the kind directory.
    fn record_key(kind: RecordKind, id: &str) -> Result<String> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) || id.contains("..") {
            return Err(AppError::validation(format!("unsafe record id {:?}", id)));
        }
        Ok(format!("{}/{}.json", kind, id))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Count `*.json` files directly under one kind directory.
    async fn count_dir(&self, kind: RecordKind) -> Result<usize> {
        let dir = self.path(kind.as_str());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl RecordStorage for LocalStorage {
    async fn save(&self, record: &CrawlRecord) -> Result<()> {
        let (kind, id) = record.key();
        let key = Self::record_key(kind, &id).map_err(|e| AppError::persist(&record.id, e))?;
        self.write_json(&key, record)
            .await
            .map_err(|e| AppError::persist(&record.id, e))?;
        log::debug!("Saved {} to {}", record.id, key);
        Ok(())
    }

    async fn load(&self, kind: RecordKind, id: &str) -> Result<Option<CrawlRecord>> {
        self.read_json(&Self::record_key(kind, id)?).await
    }

    async fn count(&self) -> Result<usize> {
        let mut total = 0;
        for kind in RecordKind::all() {
            total += self.count_dir(kind).await?;
        }
        Ok(total)
    }

    async fn record_run(&self, summary: &CrawlSummary) -> Result<()> {
        self.write_json(LATEST_RUN_KEY, summary).await
    }

    async fn last_run(&self) -> Result<Option<CrawlSummary>> {
        self.read_json(LATEST_RUN_KEY).await
    }
}
