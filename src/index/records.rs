//! Durable table of when each source was last indexed

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::IndexError;
use crate::persist::{read_json, write_json_atomic, Committed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct Stamp(#[serde(with = "crate::timestamp::serde_format")] NaiveDateTime);

/// Source URL to last-indexed time, saved as a JSON object
#[derive(Debug)]
pub struct IndexRecords {
    path: PathBuf,
    table: Mutex<BTreeMap<String, Stamp>>,
}

impl IndexRecords {
    /// Load the table at `path`; a missing file is an empty table
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let table: BTreeMap<String, Stamp> = read_json(&path).await?.unwrap_or_default();
        info!(path = %path.display(), records = table.len(), "Loaded index records");

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// When `url` was last indexed
    pub async fn get(&self, url: &str) -> Option<NaiveDateTime> {
        self.table.lock().await.get(url).map(|stamp| stamp.0)
    }

    /// Every record, ordered by URL
    pub async fn all(&self) -> Vec<(String, NaiveDateTime)> {
        self.table
            .lock()
            .await
            .iter()
            .map(|(url, stamp)| (url.clone(), stamp.0))
            .collect()
    }

    /// Number of recorded sources
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Whether no source has been recorded
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }

    /// Set the last-indexed time of `url`, returning the previous one
    pub async fn record(
        &self,
        url: &str,
        at: NaiveDateTime,
    ) -> Committed<Option<NaiveDateTime>> {
        let mut table = self.table.lock().await;
        let previous = table.insert(url.to_string(), Stamp(at)).map(|stamp| stamp.0);
        debug!(url, at = %crate::timestamp::format(&at), "Recorded indexing time");

        let written = write_json_atomic(&self.path, &*table).await;
        Committed::new(previous, written)
    }

    /// Forget `url`, returning its last-indexed time
    ///
    /// The file is only rewritten when there was something to remove.
    pub async fn remove(&self, url: &str) -> Committed<Option<NaiveDateTime>> {
        let mut table = self.table.lock().await;
        match table.remove(url) {
            Some(stamp) => {
                let written = write_json_atomic(&self.path, &*table).await;
                Committed::new(Some(stamp.0), written)
            }
            None => Committed::new(None, Ok(())),
        }
    }
}
