//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error (connection, timeout, redirect loop)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// Status code returned
        status: u16,
    },

    /// The response is not a document we can extract text from
    #[error("Unsupported content type '{content_type}' for {url}")]
    UnsupportedContent {
        /// Requested URL
        url: String,
        /// Declared content type
        content_type: String,
    },

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The crawler configuration cannot be turned into a client
    #[error("Invalid crawler configuration: {0}")]
    Config(String),

    /// The URL parsed but cannot be crawled
    #[error("Invalid crawl URL: {0}")]
    InvalidUrl(String),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
