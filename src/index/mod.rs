//! Index module
//!
//! This module hands crawled pages to the similarity-search collaborator
//! and keeps the table of when each source was last indexed.

pub mod collection;
mod doc_id;
pub mod error;
mod ingest;
mod language;
mod records;

pub use collection::{
    DocumentMetadata, LocalCollection, QueryMatch, QueryResult, SearchCollection,
};
pub use doc_id::document_id;
pub use error::{CollectionError, IndexError};
pub use ingest::{IndexIngestor, IngestConfig, IngestReport, DEFAULT_BATCH_SIZE};
pub use language::detect_language;
pub use records::IndexRecords;
