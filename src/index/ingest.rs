//! Batched hand-off of crawled pages to the search collaborator

use std::sync::Arc;

use tracing::{error, info, instrument};
use url::Url;

use super::collection::{DocumentMetadata, SearchCollection};
use super::doc_id::document_id;
use super::language::detect_language;
use crate::crawler::IndexedPage;

/// Default number of documents per `add` call
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for ingestion
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Documents per batch
    pub batch_size: usize,

    /// Language used when the URL gives no hint
    pub default_language: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_language: "es".to_string(),
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Batches submitted
    pub batches: usize,

    /// Batches the collection rejected
    pub failed_batches: usize,

    /// Documents in accepted batches
    pub documents_added: usize,
}

/// Feeds pages into a [`SearchCollection`]
#[derive(Clone)]
pub struct IndexIngestor {
    collection: Arc<dyn SearchCollection>,
    config: IngestConfig,
}

impl IndexIngestor {
    /// Create an ingestor writing to `collection`
    pub fn new(collection: Arc<dyn SearchCollection>, config: IngestConfig) -> Self {
        Self { collection, config }
    }

    /// The collection documents are written to
    pub fn collection(&self) -> &Arc<dyn SearchCollection> {
        &self.collection
    }

    /// Metadata stored for `page`
    pub fn metadata_for(&self, page: &IndexedPage) -> DocumentMetadata {
        let source = Url::parse(&page.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();

        DocumentMetadata {
            url: page.url.clone(),
            title: page.title.clone(),
            source,
            description: page.description.clone(),
            last_updated: page.last_updated,
            language: detect_language(&page.url, &self.config.default_language),
        }
    }

    /// Add `pages` to the collection in batches
    ///
    /// A batch the collection rejects is logged and skipped; the remaining
    /// batches are still submitted.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn ingest(&self, pages: &[IndexedPage]) -> IngestReport {
        let mut report = IngestReport::default();

        for batch in pages.chunks(self.config.batch_size.max(1)) {
            report.batches += 1;

            let ids = batch.iter().map(|page| document_id(&page.url)).collect();
            let documents = batch.iter().map(|page| page.content.clone()).collect();
            let metadatas = batch.iter().map(|page| self.metadata_for(page)).collect();

            match self.collection.add(ids, documents, metadatas).await {
                Ok(()) => {
                    report.documents_added += batch.len();
                    info!("Added batch of {} documents to the index", batch.len());
                }
                Err(e) => {
                    report.failed_batches += 1;
                    error!(batch = report.batches, error = %e, "Error adding batch to the index");
                }
            }
        }

        report
    }
}
