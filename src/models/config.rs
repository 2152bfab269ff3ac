//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Frontier;
use crate::queue::ShutdownPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API and HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Work queue sizing and shutdown behavior
    #[serde(default)]
    pub queue: QueueConfig,

    /// Where fetched records are written
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url).map_err(|e| {
            AppError::validation(format!(
                "crawler.base_url '{}' is not a URL: {}",
                self.crawler.base_url, e
            ))
        })?;
        if self.crawler.frontier.is_empty() {
            return Err(AppError::validation("crawler.frontier is empty"));
        }
        if self.queue.workers == 0 {
            return Err(AppError::validation("queue.workers must be > 0"));
        }
        if self.storage.backend == StorageBackend::Local
            && self.storage.root_dir.as_os_str().is_empty()
        {
            return Err(AppError::validation("storage.root_dir is empty"));
        }
        Ok(())
    }
}

/// Remote API and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the content API (must end with `/`)
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Frontier lists used to seed a crawl
    #[serde(default = "defaults::frontier")]
    pub frontier: Vec<Frontier>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            frontier: defaults::frontier(),
        }
    }
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Maximum pending items (0 = unbounded)
    #[serde(default)]
    pub capacity: usize,

    /// Run deadline in seconds (0 = no deadline)
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,

    /// What to do with pending work when the deadline or an interrupt hits
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

impl QueueConfig {
    /// The run deadline, if any.
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            capacity: 0,
            run_timeout_secs: defaults::run_timeout(),
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files under `root_dir`
    #[default]
    Local,
    /// Process memory only (dry runs)
    Memory,
}

/// Persistence sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "defaults::root_dir")]
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root_dir: defaults::root_dir(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of debug, info, warn, error
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::models::Frontier;

    // Crawler defaults
    pub fn base_url() -> String {
        "https://hacker-news.firebaseio.com/v0/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; hncrawl/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn frontier() -> Vec<Frontier> {
        vec![Frontier::Show, Frontier::Job, Frontier::Top, Frontier::Ask]
    }

    // Queue defaults
    pub fn workers() -> usize {
        10
    }
    pub fn run_timeout() -> u64 {
        60
    }

    // Storage defaults
    pub fn root_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Logging defaults
    pub fn level() -> String {
        "info".into()
    }
}
