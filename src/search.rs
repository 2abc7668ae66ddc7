//! # Search Module
//!
//! Turns collaborator matches into the results shown to users.
//!
//! ## Key Components
//!
//! - `SearchOptions`: result limit and optional source filter
//! - `SearchResult`: a hit with title, snippet, source host, URL and score
//! - `search_collection`: run a query against a `SearchCollection`

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::index::{CollectionError, QueryMatch, SearchCollection};

/// Maximum number of characters of document text in a snippet
pub const SNIPPET_CHARS: usize = 500;

/// Options for search queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results to return
    pub limit: usize,

    /// Only return documents whose source host contains this text
    pub source_filter: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            source_filter: None,
        }
    }
}

/// Search result with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title of the page
    pub title: String,

    /// Start of the document text
    pub snippet: String,

    /// Host name the page was served from
    pub source: String,

    /// URL of the page
    pub url: String,

    /// Similarity in `[0, 1]`, higher is better
    pub score: f32,
}

impl From<QueryMatch> for SearchResult {
    fn from(hit: QueryMatch) -> Self {
        Self {
            title: hit.metadata.title,
            snippet: snippet(&hit.document),
            source: hit.metadata.source,
            url: hit.metadata.url,
            score: (1.0 - hit.distance).max(0.0),
        }
    }
}

/// First [`SNIPPET_CHARS`] characters of `document`, with `...` when cut
pub fn snippet(document: &str) -> String {
    match document.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &document[..cut]),
        None => document.to_string(),
    }
}

/// Search `collection` for `query`
#[instrument(skip(collection))]
pub async fn search_collection(
    collection: &dyn SearchCollection,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, CollectionError> {
    if options.limit == 0 || query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let results: Vec<SearchResult> = match &options.source_filter {
        None => collection
            .query(query, options.limit)
            .await?
            .matches
            .into_iter()
            .map(SearchResult::from)
            .collect(),
        Some(filter) => {
            // Rank everything, then keep the first hits from matching hosts
            let filter = filter.to_lowercase();
            let everything = collection.count().await?;
            collection
                .query(query, everything)
                .await?
                .matches
                .into_iter()
                .filter(|hit| hit.metadata.source.to_lowercase().contains(&filter))
                .take(options.limit)
                .map(SearchResult::from)
                .collect()
        }
    };

    debug!(results = results.len(), "Search completed");
    Ok(results)
}
