//! Error types for the source registry

use crate::error::Error as CrateError;
use crate::persist::PersistError;
use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The URL does not parse or has no host
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A source with this URL is already registered
    #[error("Source {0} already exists")]
    Duplicate(String),

    /// No source with this URL is registered
    #[error("Source {0} not found")]
    NotFound(String),

    /// The registry file exists but cannot be read
    #[error("Failed to load sources: {0}")]
    Load(#[from] PersistError),
}

impl From<RegistryError> for CrateError {
    fn from(err: RegistryError) -> Self {
        CrateError::Registry(err.to_string())
    }
}
