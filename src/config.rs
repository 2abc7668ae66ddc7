//! # Vectoria Configuration Module
//!
//! Where the indexer keeps its files, which sources a fresh installation
//! starts with, and the nested crawler and ingestion settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crawler::CrawlerConfig;
use crate::index::IngestConfig;
use crate::registry::NewSource;

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct VectoriaConfig {
    /// Directory holding every data file
    pub data_dir: PathBuf,

    /// Registry file name inside `data_dir`
    pub sources_file: String,

    /// Index record file name inside `data_dir`
    pub records_file: String,

    /// Local collection file name inside `data_dir`
    pub collection_file: String,

    /// Pause between sources during a full re-index
    pub source_delay: Duration,

    /// Sources registered when no registry file exists yet
    pub seed_sources: Vec<NewSource>,

    /// Crawler settings
    pub crawler: CrawlerConfig,

    /// Ingestion settings
    pub ingest: IngestConfig,
}

/// The source a fresh registry starts with
pub fn default_seed_sources() -> Vec<NewSource> {
    vec![NewSource::new(
        "https://docs.python.org/es/3/",
        "Documentación Python (Español)",
    )
    .description("Documentación oficial de Python en español")
    .category("Python")
    .language("es")]
}

impl Default for VectoriaConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vectoria"),
            sources_file: "sources.json".to_string(),
            records_file: "indexed.json".to_string(),
            collection_file: "collection.json".to_string(),
            source_delay: Duration::from_secs(1),
            seed_sources: default_seed_sources(),
            crawler: CrawlerConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl VectoriaConfig {
    /// Create a new builder
    pub fn builder() -> VectoriaConfigBuilder {
        VectoriaConfigBuilder::new()
    }

    /// Path of the source registry
    pub fn sources_path(&self) -> PathBuf {
        self.data_dir.join(&self.sources_file)
    }

    /// Path of the index record table
    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(&self.records_file)
    }

    /// Path of the local collection
    pub fn collection_path(&self) -> PathBuf {
        self.data_dir.join(&self.collection_file)
    }
}

/// Builder for VectoriaConfig
#[derive(Debug, Default)]
pub struct VectoriaConfigBuilder {
    config: VectoriaConfig,
}

impl VectoriaConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: VectoriaConfig::default(),
        }
    }

    /// Set the data directory
    pub fn data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// Set the pause between sources during a full re-index
    pub fn source_delay(mut self, delay: Duration) -> Self {
        self.config.source_delay = delay;
        self
    }

    /// Set the sources a fresh registry starts with
    pub fn seed_sources(mut self, seeds: Vec<NewSource>) -> Self {
        self.config.seed_sources = seeds;
        self
    }

    /// Set the crawler configuration
    pub fn crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.config.crawler = crawler;
        self
    }

    /// Set the ingestion configuration
    pub fn ingest(mut self, ingest: IngestConfig) -> Self {
        self.config.ingest = ingest;
        self
    }

    /// Build the configuration
    pub fn build(self) -> VectoriaConfig {
        self.config
    }
}
