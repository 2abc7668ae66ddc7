//! # Crawler Configuration Module
//!
//! This module provides configuration options for the crawler, including
//! politeness, request headers and the selectors used for
//! content extraction. It uses a builder pattern for flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! ## Features
//!
//! - Defaults suitable for polite, single-worker crawling of documentation sites
//! - Container selectors tried in priority order for the main content
//! - Tags stripped from the content before text is collected
//! - Extensions that are never worth fetching
//! - Explicit decoding policy for pages that are not valid UTF-8

use std::time::Duration;

use super::decode::DecodePolicy;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default minimum number of words for a page to be indexable
pub const DEFAULT_MIN_WORDS: usize = 20;

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Pause in milliseconds each worker takes after every request
    pub politeness_delay_ms: u64,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,

    /// Optional wall-clock limit for a whole crawl
    pub crawl_timeout: Option<Duration>,

    /// Number of concurrent fetch workers
    pub workers: usize,

    /// User agent to use for requests
    pub user_agent: String,

    /// Value of the Accept-Language header
    pub accept_language: String,

    /// Pages with fewer words than this are not indexed
    pub min_words: usize,

    /// CSS selectors for the main content container, in priority order
    pub content_selectors: Vec<String>,

    /// Tag names removed from the content before extracting text
    pub exclude_tags: Vec<String>,

    /// File extensions that are never followed
    pub skip_extensions: Vec<String>,

    /// How response bytes are turned into text
    pub decode: DecodePolicy,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            politeness_delay_ms: 500,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            crawl_timeout: None,
            workers: 1,
            user_agent: format!(
                "Mozilla/5.0 (compatible; vectoria/{}; documentation indexer)",
                env!("CARGO_PKG_VERSION")
            ),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            min_words: DEFAULT_MIN_WORDS,
            content_selectors: strings(&[
                "main",
                "article",
                ".content",
                ".documentation",
                ".doc-content",
                ".markdown-body",
                ".page-content",
                "#content",
                "#main-content",
                ".body",
            ]),
            exclude_tags: strings(&[
                "script", "style", "nav", "footer", "aside", "header", "form",
            ]),
            skip_extensions: strings(&[
                "pdf", "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "zip", "gz",
                "tgz", "tar", "bz2", "xz", "7z", "rar", "exe", "msi", "dmg", "pkg", "deb",
                "rpm", "apk", "iso", "mp3", "mp4", "avi", "mov", "webm", "woff", "woff2",
                "ttf", "eot", "css", "js",
            ]),
            decode: DecodePolicy::default(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the pause in milliseconds between requests
    pub fn politeness_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.politeness_delay_ms = delay_ms;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set a wall-clock limit for a whole crawl
    pub fn crawl_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.crawl_timeout = timeout;
        self
    }

    /// Set the number of concurrent fetch workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the Accept-Language header value
    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.config.accept_language = accept_language.into();
        self
    }

    /// Set the minimum word count for indexable pages
    pub fn min_words(mut self, min_words: usize) -> Self {
        self.config.min_words = min_words;
        self
    }

    /// Set the CSS selectors for the main content container
    pub fn content_selectors(mut self, content_selectors: Vec<String>) -> Self {
        self.config.content_selectors = content_selectors;
        self
    }

    /// Set the tags removed before extracting text
    pub fn exclude_tags(mut self, exclude_tags: Vec<String>) -> Self {
        self.config.exclude_tags = exclude_tags;
        self
    }

    /// Set the extensions that are never followed
    pub fn skip_extensions(mut self, skip_extensions: Vec<String>) -> Self {
        self.config.skip_extensions = skip_extensions;
        self
    }

    /// Set the decoding policy
    pub fn decode(mut self, decode: DecodePolicy) -> Self {
        self.config.decode = decode;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the politeness delay as a Duration
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}
