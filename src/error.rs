//! Error types for the Vectoria crate

use thiserror::Error;

/// Result type for Vectoria operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Vectoria operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Index or search collaborator error
    #[error("Index error: {0}")]
    Index(String),

    /// Source registry error
    #[error("Registry error: {0}")]
    Registry(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
