//! # Website Crawler Module
//!
//! This module fetches documentation pages, repairs their text and follows
//! same-site links. It is the first stage of the indexing pipeline: the
//! pages it returns go straight to the [`crate::index`] ingestor.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: request headers, budgets, politeness, selectors
//! - `PageFetcher`: HTTP retrieval with encoding recovery
//! - `normalize`: mojibake repair and Unicode/whitespace cleanup
//! - `extract_page`: title, main content and description of a page
//! - `harvest_links`: same-site links worth visiting
//! - `Crawler`: the frontier-driven traversal
//!
//! ## Failure policy
//!
//! Nothing that goes wrong with an individual page stops a crawl. Fetch
//! failures are logged and skipped, decoding falls back until something
//! reads, and pages without enough text are dropped quietly.

mod config;
mod content_extraction;
mod crawl;
pub mod decode;
mod error;
mod fetcher;
mod frontier;
mod links;
pub mod normalizer;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use content_extraction::{
    extract_description, extract_main_content, extract_page, extract_title, ExtractionReject,
};
pub use crawl::{CrawlSummary, Crawler};
pub use decode::DecodePolicy;
pub use error::CrawlError;
pub use fetcher::{FetchedPage, PageFetcher, ParsedDocument};
pub use links::{harvest_links, normalize_url, SiteScope};
pub use normalizer::{fix_mojibake, normalize};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A page that passed extraction and is ready for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPage {
    /// URL the page was requested under
    pub url: String,

    /// Normalized page title
    pub title: String,

    /// Normalized main text of the page
    pub content: String,

    /// Meta description, empty when the page has none
    pub description: String,

    /// When the page was extracted
    #[serde(with = "crate::timestamp::serde_format")]
    pub last_updated: NaiveDateTime,
}

impl IndexedPage {
    /// Number of whitespace-separated words in the content
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_page_serializes_timestamp_format() {
        let page = IndexedPage {
            url: "https://example.com/guide".to_string(),
            title: "Guide".to_string(),
            content: "one two three".to_string(),
            description: String::new(),
            last_updated: crate::timestamp::parse("2024-05-01 12:30:00").unwrap(),
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["last_updated"], "2024-05-01 12:30:00");
        assert_eq!(page.word_count(), 3);
    }
}
