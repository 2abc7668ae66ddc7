//! The similarity-search collaborator and a local lexical implementation

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::CollectionError;
use crate::persist::{read_json, write_json_atomic};

/// Metadata stored next to every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Page URL
    pub url: String,

    /// Page title
    pub title: String,

    /// Host name of the page URL
    pub source: String,

    /// Meta description
    pub description: String,

    /// When the page was extracted
    #[serde(with = "crate::timestamp::serde_format")]
    pub last_updated: NaiveDateTime,

    /// Language tag
    pub language: String,
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    /// Document id
    pub id: String,

    /// Stored document text
    pub document: String,

    /// Stored metadata
    pub metadata: DocumentMetadata,

    /// Distance from the query, lower is closer
    pub distance: f32,
}

/// Hits for a query, closest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Ranked matches
    pub matches: Vec<QueryMatch>,
}

/// A store that can rank documents by similarity to a query text
///
/// `add` has upsert semantics: a document whose id already exists replaces
/// the stored one.
#[async_trait]
pub trait SearchCollection: Send + Sync {
    /// Insert or replace documents; the three vectors are parallel
    async fn add(
        &self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<DocumentMetadata>,
    ) -> Result<(), CollectionError>;

    /// Return at most `k` documents ordered by ascending distance
    async fn query(&self, text: &str, k: usize) -> Result<QueryResult, CollectionError>;

    /// Number of stored documents
    async fn count(&self) -> Result<usize, CollectionError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    document: String,
    metadata: DocumentMetadata,
}

/// In-process collection ranking by query term overlap
///
/// The distance of a document is `1 - matched / total` over the distinct
/// lowercase alphanumeric terms of the query. Documents matching no term
/// are not returned. When opened from a path the whole collection is
/// written back after every `add`; if that write fails the batch is undone.
#[derive(Debug, Default)]
pub struct LocalCollection {
    documents: RwLock<BTreeMap<String, StoredDocument>>,
    path: Option<PathBuf>,
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl LocalCollection {
    /// An empty collection that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the collection stored at `path`, or start empty if there is none
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CollectionError> {
        let path = path.as_ref().to_path_buf();
        let documents: BTreeMap<String, StoredDocument> =
            read_json(&path).await?.unwrap_or_default();
        info!(path = %path.display(), documents = documents.len(), "Opened local collection");

        Ok(Self {
            documents: RwLock::new(documents),
            path: Some(path),
        })
    }
}

#[async_trait]
impl SearchCollection for LocalCollection {
    async fn add(
        &self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<DocumentMetadata>,
    ) -> Result<(), CollectionError> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(CollectionError::InvalidBatch(format!(
                "{} ids, {} documents, {} metadata records",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }

        let mut stored = self.documents.write().await;
        let added = ids.len();
        let mut replaced = Vec::with_capacity(added);
        for ((id, document), metadata) in ids.into_iter().zip(documents).zip(metadatas) {
            let previous = stored.insert(id.clone(), StoredDocument { document, metadata });
            replaced.push((id, previous));
        }

        if let Some(path) = &self.path {
            if let Err(e) = write_json_atomic(path, &*stored).await {
                // Undo in reverse so a repeated id gets its original entry back
                for (id, previous) in replaced.into_iter().rev() {
                    match previous {
                        Some(previous) => stored.insert(id, previous),
                        None => stored.remove(&id),
                    };
                }
                return Err(e.into());
            }
        }
        debug!(added, total = stored.len(), "Stored documents");

        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<QueryResult, CollectionError> {
        let query_terms = terms(text);
        if query_terms.is_empty() || k == 0 {
            return Ok(QueryResult::default());
        }

        let stored = self.documents.read().await;
        let total = query_terms.len() as f32;
        let mut matches: Vec<QueryMatch> = stored
            .iter()
            .filter_map(|(id, entry)| {
                let mut document_terms = terms(&entry.document);
                document_terms.extend(terms(&entry.metadata.title));
                let matched = query_terms.intersection(&document_terms).count();
                (matched > 0).then(|| QueryMatch {
                    id: id.clone(),
                    document: entry.document.clone(),
                    metadata: entry.metadata.clone(),
                    distance: 1.0 - matched as f32 / total,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(k);

        Ok(QueryResult { matches })
    }

    async fn count(&self) -> Result<usize, CollectionError> {
        Ok(self.documents.read().await.len())
    }
}
