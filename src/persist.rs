//! Whole-file JSON persistence shared by the registry, the index record
//! table and the local collection.
//!
//! Writes go to a sibling `.tmp` file that is then renamed over the
//! target, so readers never observe a half-written file. Callers must
//! serialize their own writers; two interleaved writers would race on the
//! temporary file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Error type for persistence operations
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem error
    #[error("IO error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// JSON encoding or decoding error
    #[error("JSON error in {path}: {source}")]
    Json {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// An in-memory change and whether it reached disk
///
/// Mutations are not rolled back when the write fails; the caller decides
/// how to report a change that only lives in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Result of the mutation
    pub value: T,

    /// Why the new state could not be saved, if it could not
    pub persist_error: Option<String>,
}

impl<T> Committed<T> {
    /// Pair `value` with the outcome of the write that followed it
    pub fn new(value: T, written: Result<(), PersistError>) -> Self {
        let persist_error = written.err().map(|e| {
            warn!(error = %e, "Change kept in memory but not saved");
            e.to_string()
        });
        Self {
            value,
            persist_error,
        }
    }

    /// Whether the change was saved
    pub fn is_durable(&self) -> bool {
        self.persist_error.is_none()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and decode a JSON file, returning `None` when it does not exist
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode `value` as pretty JSON and atomically replace `path` with it
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }

    let temp = temp_path(path);
    fs::write(&temp, json).await.map_err(io_err)?;
    fs::rename(&temp, path).await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path(Path::new("/data/sources.json"));
        assert_eq!(temp, PathBuf::from("/data/sources.json.tmp"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<Vec<String>> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.json");

        let mut table = BTreeMap::new();
        table.insert("https://example.com/".to_string(), "2024-01-01 00:00:00".to_string());
        write_json_atomic(&path, &table).await.unwrap();

        let back: BTreeMap<String, String> = read_json(&path).await.unwrap().unwrap();
        assert_eq!(back, table);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_non_ascii_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        write_json_atomic(&path, &vec!["Documentación"]).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Documentación"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<Vec<String>>, _> = read_json(&path).await;
        assert!(matches!(result, Err(PersistError::Json { .. })));
    }
}
