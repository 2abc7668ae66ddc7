//! # Indexing Service Module
//!
//! The operations a front end drives: searching, managing sources and
//! (re-)indexing them. Every registry change and every index record commit
//! goes through one catalog lock, so a source deleted while its crawl is
//! running is not left behind with a fresh index record.
//!
//! ## Key Components
//!
//! - `Vectoria`: the service, owning the registry, the record table, the
//!   crawler and the ingestor
//! - `Outcome`, `IndexOutcome`, `AggregateOutcome`, `Stats`: operation results

mod outcome;

pub use outcome::{AggregateOutcome, IndexOutcome, Outcome, ReportStatus, SourceReport, Stats};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::VectoriaConfig;
use crate::crawler::Crawler;
use crate::index::{IndexIngestor, IndexRecords, LocalCollection, SearchCollection};
use crate::registry::{
    source_key, NewSource, Source, SourceRegistry, SourceStatus, SourceUpdate,
};
use crate::search::{search_collection, SearchOptions, SearchResult};
use crate::{timestamp, Result};

fn round_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

/// The indexing service
pub struct Vectoria {
    config: VectoriaConfig,
    registry: SourceRegistry,
    records: IndexRecords,
    crawler: Crawler,
    ingestor: IndexIngestor,
    catalog: Mutex<()>,
}

impl Vectoria {
    /// Open the service over the files in `config.data_dir`, using a
    /// [`LocalCollection`] as the search collaborator
    pub async fn open(config: VectoriaConfig) -> Result<Self> {
        let collection = LocalCollection::open(config.collection_path()).await?;
        Self::with_collection(config, Arc::new(collection)).await
    }

    /// Open the service with an external search collaborator
    pub async fn with_collection(
        config: VectoriaConfig,
        collection: Arc<dyn SearchCollection>,
    ) -> Result<Self> {
        let registry =
            SourceRegistry::open_or_seed(config.sources_path(), &config.seed_sources).await?;
        let records = IndexRecords::open(config.records_path()).await?;
        let crawler = Crawler::new(config.crawler.clone())?;
        let ingestor = IndexIngestor::new(collection, config.ingest.clone());

        Ok(Self {
            config,
            registry,
            records,
            crawler,
            ingestor,
            catalog: Mutex::new(()),
        })
    }

    /// The configuration the service was opened with
    pub fn config(&self) -> &VectoriaConfig {
        &self.config
    }

    /// The crawler used for indexing
    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    /// The table of last-indexed times
    pub fn records(&self) -> &IndexRecords {
        &self.records
    }

    /// Up to `k` documents matching `query`
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let options = SearchOptions {
            limit: k,
            source_filter: None,
        };
        self.search_with(query, &options).await
    }

    /// Search with explicit options
    pub async fn search_with(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        Ok(search_collection(self.ingestor.collection().as_ref(), query, options).await?)
    }

    /// Every registered source
    pub async fn list_sources(&self) -> Vec<Source> {
        self.registry.list().await
    }

    /// Register a source
    #[instrument(skip_all, fields(url = %new.url))]
    pub async fn add_source(&self, new: NewSource) -> Outcome {
        let _catalog = self.catalog.lock().await;
        match self.registry.add(new).await {
            Ok(committed) => {
                Outcome::applied("Source added", committed.value, committed.persist_error)
            }
            Err(e) => Outcome::rejected(e.to_string()),
        }
    }

    /// Change the descriptive fields of a source
    #[instrument(skip(self, update))]
    pub async fn update_source(&self, url: &str, update: SourceUpdate) -> Outcome {
        let _catalog = self.catalog.lock().await;
        match self.registry.update(url, update).await {
            Ok(committed) => {
                Outcome::applied("Source updated", committed.value, committed.persist_error)
            }
            Err(e) => Outcome::rejected(e.to_string()),
        }
    }

    /// Remove a source and its index record
    #[instrument(skip(self))]
    pub async fn delete_source(&self, url: &str) -> Outcome {
        let _catalog = self.catalog.lock().await;
        let committed = match self.registry.delete(url).await {
            Ok(committed) => committed,
            Err(e) => return Outcome::rejected(e.to_string()),
        };

        let removed = self.records.remove(&committed.value.url).await;
        let persist_error = match (committed.persist_error, removed.persist_error) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
        };

        Outcome::applied("Source deleted", committed.value, persist_error)
    }

    /// Crawl `url`, add its pages to the collection and record the time
    ///
    /// Any crawl that extracts at least one page succeeds and is recorded,
    /// even if the collection rejects some or all batches; those are counted
    /// in `failed_batches`.
    ///
    /// `url` does not need to be registered. If it was registered when the
    /// crawl started and has been deleted by the time it ends, the pages are
    /// still ingested but no record is written.
    #[instrument(skip(self, cancel))]
    pub async fn index_source(
        &self,
        url: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> IndexOutcome {
        let started = Instant::now();
        let key = source_key(url);
        let registered_at_start = self.registry.contains(&key).await;
        let previously_indexed = self.records.get(&key).await;

        let failure = |message: String, pages_processed: usize| IndexOutcome {
            success: false,
            message,
            url: key.clone(),
            documents_indexed: 0,
            pages_processed,
            failed_batches: 0,
            elapsed_secs: round_secs(started),
            previously_indexed,
            durable: true,
        };

        let summary = match self.crawler.crawl_site(url, max_pages, cancel).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Cannot crawl source");
                return failure(format!("Could not crawl the site: {}", e), 0);
            }
        };

        if summary.pages.is_empty() {
            warn!("No pages extracted");
            return failure(
                "Could not index the site: no pages extracted".to_string(),
                summary.visited,
            );
        }

        let report = self.ingestor.ingest(&summary.pages).await;
        if report.failed_batches > 0 {
            warn!(
                failed_batches = report.failed_batches,
                batches = report.batches,
                "Some batches were rejected by the collection"
            );
        }

        let durable = {
            let _catalog = self.catalog.lock().await;
            if registered_at_start && !self.registry.contains(&key).await {
                warn!("Source was deleted during indexing, not recording it");
                true
            } else {
                self.records
                    .record(&key, timestamp::now())
                    .await
                    .is_durable()
            }
        };

        let elapsed_secs = round_secs(started);
        info!(
            documents = report.documents_added,
            pages = summary.visited,
            elapsed_secs,
            "Indexed source"
        );

        IndexOutcome {
            success: true,
            message: if report.failed_batches > 0 {
                format!(
                    "Indexed {} documents from {} pages, {} of {} batches rejected",
                    report.documents_added,
                    summary.visited,
                    report.failed_batches,
                    report.batches
                )
            } else {
                format!(
                    "Indexed {} documents from {} pages",
                    report.documents_added, summary.visited
                )
            },
            url: key,
            documents_indexed: report.documents_added,
            pages_processed: summary.visited,
            failed_batches: report.failed_batches,
            elapsed_secs,
            previously_indexed,
            durable,
        }
    }

    /// Re-index every active source in registry order
    ///
    /// `on_progress` is called after each source. Cancellation is checked
    /// before every source and cuts the pause between sources short.
    #[instrument(skip(self, cancel, on_progress))]
    pub async fn reindex_all(
        &self,
        max_pages: u32,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(&SourceReport) + Send,
    ) -> AggregateOutcome {
        let started = Instant::now();
        let sources = self.registry.active().await;
        let mut outcome = AggregateOutcome {
            total_sources: sources.len(),
            ..AggregateOutcome::default()
        };
        info!("Starting full index of {} active sources", sources.len());

        for (position, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let result = self.index_source(&source.url, max_pages, cancel).await;
            if cancel.is_cancelled() {
                // The crawl of this source may have been cut short
                outcome.cancelled = true;
            }
            let report = if result.success {
                outcome.succeeded += 1;
                outcome.total_documents += result.documents_indexed;
                info!("Successfully indexed {}", source.name);
                SourceReport {
                    name: source.name.clone(),
                    url: source.url.clone(),
                    status: ReportStatus::Succeeded,
                    documents: result.documents_indexed,
                    elapsed_secs: result.elapsed_secs,
                    error: None,
                }
            } else {
                outcome.failed += 1;
                warn!("Failed to index {}", source.name);
                SourceReport {
                    name: source.name.clone(),
                    url: source.url.clone(),
                    status: ReportStatus::Failed,
                    documents: 0,
                    elapsed_secs: result.elapsed_secs,
                    error: Some(result.message),
                }
            };
            on_progress(&report);
            outcome.details.push(report);

            let is_last = position + 1 == sources.len();
            if !is_last && !self.config.source_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.source_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        outcome.elapsed_secs = round_secs(started);
        info!("Index completed in {} seconds", outcome.elapsed_secs);
        outcome
    }

    /// Registry and collection statistics
    pub async fn stats(&self) -> Stats {
        let sources = self.registry.list().await;

        let mut categories = BTreeMap::new();
        let mut languages = BTreeMap::new();
        for source in &sources {
            *categories.entry(source.category.clone()).or_insert(0) += 1;
            *languages.entry(source.language.clone()).or_insert(0) += 1;
        }

        let total_documents = match self.ingestor.collection().count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Cannot count documents");
                0
            }
        };

        Stats {
            total_sources: sources.len(),
            active_sources: sources
                .iter()
                .filter(|s| s.status == SourceStatus::Active)
                .count(),
            indexed_sources: self.records.len().await,
            total_documents,
            categories,
            languages,
            generated_at: timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerConfig;
    use crate::index::CollectionError;
    use mockito::{Server, ServerGuard};
    use std::time::Duration;
    use tempfile::TempDir;

    fn page_html(title: &str, links: &[&str]) -> String {
        let text = (0..30)
            .map(|i| format!("{} palabra{}", title.to_lowercase(), i))
            .collect::<Vec<_>>()
            .join(" ");
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">link</a>"#, href))
            .collect();
        format!(
            "<html><head><title>{}</title></head><body><nav>{}</nav><main>{}</main></body></html>",
            title, anchors, text
        )
    }

    async fn site() -> ServerGuard {
        let mut server = Server::new_async().await;
        for (path, title, links) in [("/", "Inicio", vec!["/guia"]), ("/guia", "Guia", vec!["/"])] {
            server
                .mock("GET", path)
                .with_status(200)
                .with_header("content-type", "text/html; charset=utf-8")
                .with_body(page_html(title, &links))
                .create_async()
                .await;
        }
        server
    }

    fn config_in(dir: &TempDir, crawler: CrawlerConfig) -> VectoriaConfig {
        VectoriaConfig::builder()
            .data_dir(dir.path())
            .source_delay(Duration::ZERO)
            .seed_sources(vec![])
            .crawler(crawler)
            .build()
    }

    async fn service() -> (TempDir, Vectoria) {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, CrawlerConfig::builder().politeness_delay_ms(0).build());
        let vectoria = Vectoria::open(config).await.unwrap();
        (dir, vectoria)
    }

    /// A collaborator that is down for writes
    struct RejectingCollection;

    #[async_trait::async_trait]
    impl SearchCollection for RejectingCollection {
        async fn add(
            &self,
            _ids: Vec<String>,
            _documents: Vec<String>,
            _metadatas: Vec<crate::index::DocumentMetadata>,
        ) -> std::result::Result<(), CollectionError> {
            Err(CollectionError::Backend("connection refused".to_string()))
        }

        async fn query(
            &self,
            _text: &str,
            _k: usize,
        ) -> std::result::Result<crate::index::QueryResult, CollectionError> {
            Ok(crate::index::QueryResult::default())
        }

        async fn count(&self) -> std::result::Result<usize, CollectionError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_fresh_service_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectoriaConfig::builder().data_dir(dir.path()).build();
        let vectoria = Vectoria::open(config).await.unwrap();

        let sources = vectoria.list_sources().await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://docs.python.org/es/3/");
    }

    #[tokio::test]
    async fn test_index_then_search() {
        let server = site().await;
        let (_dir, vectoria) = service().await;
        let seed = format!("{}/", server.url());

        let outcome = vectoria.index_source(&seed, 0, &CancellationToken::new()).await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.documents_indexed, 2);
        assert_eq!(outcome.pages_processed, 2);
        assert_eq!(outcome.previously_indexed, None);
        assert!(outcome.durable);

        let results = vectoria.search("guia", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Guia");
        assert_eq!(results[0].source, "127.0.0.1");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_reindex_overwrites_record_without_duplicates() {
        let server = site().await;
        let (_dir, vectoria) = service().await;
        let seed = format!("{}/", server.url());
        let cancel = CancellationToken::new();

        vectoria.index_source(&seed, 0, &cancel).await;
        let old = timestamp::parse("2000-01-01 00:00:00").unwrap();
        vectoria.records().record(&seed, old).await;

        let outcome = vectoria.index_source(&seed, 0, &cancel).await;
        assert!(outcome.success);
        assert_eq!(outcome.previously_indexed, Some(old));

        let recorded = vectoria.records().get(&seed).await.unwrap();
        assert!(recorded > old);
        assert_eq!(vectoria.records().len().await, 1);
        assert_eq!(vectoria.stats().await.total_documents, 2);
    }

    #[tokio::test]
    async fn test_invalid_and_duplicate_sources_are_not_persisted() {
        let (dir, vectoria) = service().await;
        let path = dir.path().join("sources.json");

        let added = vectoria
            .add_source(NewSource::new("https://docs.example.com", "Docs"))
            .await;
        assert!(added.success);
        assert!(added.durable);
        let saved = std::fs::read_to_string(&path).unwrap();

        let duplicate = vectoria
            .add_source(NewSource::new("https://docs.example.com/", "Again"))
            .await;
        assert!(!duplicate.success);
        assert!(duplicate.message.contains("already exists"));

        let malformed = vectoria
            .add_source(NewSource::new("docs.example.com", "No scheme"))
            .await;
        assert!(!malformed.success);
        assert!(malformed.source.is_none());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), saved);
        assert_eq!(vectoria.list_sources().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_forgets_index_record() {
        let server = site().await;
        let (_dir, vectoria) = service().await;
        let seed = format!("{}/", server.url());
        let cancel = CancellationToken::new();

        assert!(vectoria.add_source(NewSource::new(&seed, "Local")).await.success);
        assert!(vectoria.index_source(&seed, 0, &cancel).await.success);
        assert_eq!(vectoria.stats().await.indexed_sources, 1);

        let deleted = vectoria.delete_source(&seed).await;
        assert!(deleted.success);
        assert_eq!(vectoria.records().get(&seed).await, None);
        assert_eq!(vectoria.stats().await.indexed_sources, 0);

        let again = vectoria.index_source(&seed, 0, &cancel).await;
        assert!(again.success);
        assert_eq!(again.previously_indexed, None);

        let missing = vectoria.delete_source(&seed).await;
        assert!(!missing.success);
        assert!(missing.message.contains("not found"));
    }

    #[tokio::test]
    async fn test_unreachable_site_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;
        let (_dir, vectoria) = service().await;
        let seed = format!("{}/", server.url());

        let outcome = vectoria.index_source(&seed, 0, &CancellationToken::new()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.documents_indexed, 0);
        assert_eq!(vectoria.records().get(&seed).await, None);
    }

    #[tokio::test]
    async fn test_rejected_batches_still_record_the_source() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, CrawlerConfig::builder().politeness_delay_ms(0).build());
        let vectoria = Vectoria::with_collection(config, Arc::new(RejectingCollection))
            .await
            .unwrap();
        let seed = format!("{}/", server.url());

        let outcome = vectoria.index_source(&seed, 0, &CancellationToken::new()).await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.documents_indexed, 0);
        assert_eq!(outcome.pages_processed, 2);
        assert_eq!(outcome.failed_batches, 1);
        assert!(outcome.message.contains("1 of 1 batches rejected"));
        assert!(vectoria.records().get(&seed).await.is_some());
    }

    #[tokio::test]
    async fn test_reindex_all_walks_active_sources() {
        let server = site().await;
        let (_dir, vectoria) = service().await;
        let seed = format!("{}/", server.url());

        vectoria.add_source(NewSource::new(&seed, "Local")).await;
        vectoria
            .add_source(NewSource::new(format!("{}/missing", server.url()), "Broken"))
            .await;
        vectoria
            .add_source(NewSource::new("https://inactive.invalid/", "Paused"))
            .await;
        let paused = SourceUpdate {
            status: Some(SourceStatus::Inactive),
            ..SourceUpdate::default()
        };
        assert!(vectoria.update_source("https://inactive.invalid", paused).await.success);

        let mut seen = Vec::new();
        let outcome = vectoria
            .reindex_all(0, &CancellationToken::new(), |report| {
                seen.push(report.name.clone())
            })
            .await;

        assert_eq!(outcome.total_sources, 2);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.total_documents, 2);
        assert!(!outcome.cancelled);
        assert_eq!(seen, vec!["Local".to_string(), "Broken".to_string()]);
        assert_eq!(outcome.details[1].status, ReportStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_reindex_stops_early() {
        let (_dir, vectoria) = service().await;
        vectoria
            .add_source(NewSource::new("https://a.invalid/", "A"))
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = vectoria.reindex_all(0, &cancel, |_| {}).await;

        assert!(outcome.cancelled);
        assert!(outcome.details.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_last_source_marks_run_cancelled() {
        let server = site().await;
        let dir = tempfile::tempdir().unwrap();
        let crawler = CrawlerConfig::builder().politeness_delay_ms(60_000).build();
        let vectoria = Vectoria::open(config_in(&dir, crawler)).await.unwrap();
        let seed = format!("{}/", server.url());
        vectoria.add_source(NewSource::new(&seed, "Local")).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let outcome = vectoria.reindex_all(0, &cancel, |_| {}).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.details.len(), outcome.total_sources);
        assert_eq!(outcome.total_documents, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_dir, vectoria) = service().await;
        vectoria
            .add_source(NewSource::new("https://a.example/", "A").category("Rust"))
            .await;
        vectoria
            .add_source(
                NewSource::new("https://b.example/", "B")
                    .category("Rust")
                    .language("en"),
            )
            .await;

        let stats = vectoria.stats().await;
        assert_eq!(stats.total_sources, 2);
        assert_eq!(stats.active_sources, 2);
        assert_eq!(stats.indexed_sources, 0);
        assert_eq!(stats.categories.get("Rust"), Some(&2));
        assert_eq!(stats.languages.get("en"), Some(&1));
        assert_eq!(stats.languages.get("es"), Some(&1));
    }
}
