//! # Vectoria - documentation crawling and search for Rust
//!
//! This crate crawls documentation sites, turns each page into clean text
//! and feeds the result to a similarity-search collection that can then be
//! queried in plain language.
//!
//! ## Features
//!
//! - Concurrent same-site crawling with a page budget, politeness delay and
//!   cooperative cancellation
//! - Charset detection and text normalization for pages from any locale
//! - Main-content extraction with configurable selectors
//! - Batched ingestion with stable document ids and URL based language tags
//! - A JSON backed registry of sources and their last index time
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use vectoria::{Vectoria, VectoriaConfig};
//!
//! #[tokio::main]
//! async fn main() -> vectoria::Result<()> {
//!     let service = Vectoria::open(VectoriaConfig::default()).await?;
//!
//!     let cancel = CancellationToken::new();
//!     let outcome = service
//!         .index_source("https://docs.python.org/es/3/", 20, &cancel)
//!         .await;
//!     println!("{}", outcome.message);
//!
//!     for result in service.search("listas por comprensión", 5).await? {
//!         println!("{:.2} {} <{}>", result.score, result.title, result.url);
//!     }
//!     Ok(())
//! }
//! ```

mod error;

pub mod config;
pub mod crawler;
pub mod index;
pub mod persist;
pub mod registry;
pub mod search;
pub mod service;
pub mod timestamp;

pub use config::VectoriaConfig;
pub use error::{Error, Result};
pub use service::Vectoria;

/// Re-export of common types for easier usage
pub mod prelude {
    pub use crate::config::{VectoriaConfig, VectoriaConfigBuilder};
    pub use crate::crawler::{CrawlSummary, Crawler, CrawlerConfig, IndexedPage};
    pub use crate::error::{Error, Result};
    pub use crate::index::{DocumentMetadata, LocalCollection, SearchCollection};
    pub use crate::registry::{NewSource, Source, SourceStatus, SourceUpdate};
    pub use crate::search::{SearchOptions, SearchResult};
    pub use crate::service::{AggregateOutcome, IndexOutcome, Outcome, Stats, Vectoria};
}
