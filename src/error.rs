// src/error.rs

//! Unified error handling for the crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A node could not be fetched or parsed from the remote API.
    /// Non-fatal: the affected branch of the traversal is abandoned.
    #[error("Fetch error for {id}: {message}")]
    RemoteFetch { id: String, message: String },

    /// A fetched record could not be written to storage.
    #[error("Persist error for {id}: {message}")]
    Persist { id: String, message: String },

    /// Misuse of the work queue (e.g. running it twice)
    #[error("Queue error: {0}")]
    Queue(String),

    /// Internal bookkeeping corruption; always fatal to a run.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a remote fetch error for a node.
    pub fn remote_fetch(id: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::RemoteFetch {
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a node.
    pub fn persist(id: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Persist {
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a queue usage error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue(message.into())
    }

    /// Create an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}
