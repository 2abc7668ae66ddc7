//! # Index Error Types Module
//!
//! Errors raised while handing documents to the search collaborator and
//! while maintaining the index record table.
//!
//! ## Key Components
//!
//! - `CollectionError`: failures of a `SearchCollection` implementation
//! - `IndexError`: failures of the ingestion side as a whole

use crate::error::Error as CrateError;
use crate::persist::PersistError;
use thiserror::Error;

/// Error type for search collection operations
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The ids, documents and metadata of a batch do not line up
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// The collection could not save its contents
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Failure reported by a remote backend
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Error type for indexing operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// The search collaborator rejected a request
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    /// A record file could not be read or written
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

impl From<CollectionError> for CrateError {
    fn from(err: CollectionError) -> Self {
        CrateError::Index(err.to_string())
    }
}

impl From<IndexError> for CrateError {
    fn from(err: IndexError) -> Self {
        CrateError::Index(err.to_string())
    }
}
