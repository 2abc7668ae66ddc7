//! # Source Registry Module
//!
//! The list of documentation sites the indexer knows about. Sources are
//! keyed by URL and kept in insertion order; the whole list is rewritten
//! to disk after every change.
//!
//! ## Key Components
//!
//! - `Source`: a registered site and its descriptive fields
//! - `NewSource`: the input for registering a site
//! - `SourceUpdate`: the fields an update may change
//! - `SourceRegistry`: the persisted collection of sources

pub mod error;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use url::Url;

pub use error::RegistryError;

use crate::persist::{read_json, write_json_atomic, Committed};

/// Lifecycle state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Included in full re-indexing
    Active,
    /// Kept but skipped by full re-indexing
    Inactive,
    /// Marked as failing
    Error,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceStatus::Active => "active",
            SourceStatus::Inactive => "inactive",
            SourceStatus::Error => "error",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SourceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(SourceStatus::Active),
            "inactive" => Ok(SourceStatus::Inactive),
            "error" => Ok(SourceStatus::Error),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A registered documentation site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Canonical URL, the identity of the source
    pub url: String,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Category used for grouping
    pub category: String,

    /// Language tag
    pub language: String,

    /// Day the source was registered
    pub added: NaiveDate,

    /// Lifecycle state
    pub status: SourceStatus,
}

/// Input for [`SourceRegistry::add`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
    /// Site URL
    pub url: String,

    /// Display name
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Category, `General` when omitted
    #[serde(default = "default_category")]
    pub category: String,

    /// Language tag, `es` when omitted
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_category() -> String {
    "General".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

impl NewSource {
    /// A source with the default category and language
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            description: String::new(),
            category: default_category(),
            language: default_language(),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the language tag
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Changes applied by [`SourceRegistry::update`]
///
/// The URL is not part of an update. Unknown keys in a deserialized update
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New status
    pub status: Option<SourceStatus>,
    /// New language tag
    pub language: Option<String>,
}

impl SourceUpdate {
    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.language.is_none()
    }

    fn apply(self, source: &mut Source) {
        if let Some(name) = self.name {
            source.name = name;
        }
        if let Some(description) = self.description {
            source.description = description;
        }
        if let Some(category) = self.category {
            source.category = category;
        }
        if let Some(status) = self.status {
            source.status = status;
        }
        if let Some(language) = self.language {
            source.language = language;
        }
    }
}

/// Canonical form of a source URL
///
/// The URL must parse and have a host. `https://a.org` and `https://a.org/`
/// both become `https://a.org/`.
pub fn canonical_url(raw: &str) -> Result<String, RegistryError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RegistryError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(RegistryError::InvalidUrl(format!("{} has no host", raw)));
    }
    Ok(url.to_string())
}

/// Key a URL is stored under: its canonical form, or the trimmed text if
/// it does not parse
pub fn source_key(url: &str) -> String {
    canonical_url(url).unwrap_or_else(|_| url.trim().to_string())
}

/// Persisted, ordered collection of sources
#[derive(Debug)]
pub struct SourceRegistry {
    path: PathBuf,
    sources: Mutex<Vec<Source>>,
}

impl SourceRegistry {
    /// Load the registry at `path`; a missing file is an empty registry
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let sources: Vec<Source> = read_json(&path).await?.unwrap_or_default();
        info!(path = %path.display(), sources = sources.len(), "Loaded source registry");

        Ok(Self {
            path,
            sources: Mutex::new(sources),
        })
    }

    /// Load the registry at `path`, registering `seeds` if the file is missing
    pub async fn open_or_seed(
        path: impl AsRef<Path>,
        seeds: &[NewSource],
    ) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let fresh = !tokio::fs::try_exists(path).await.unwrap_or(false);
        let registry = Self::open(path).await?;

        if fresh {
            for seed in seeds {
                match registry.add(seed.clone()).await {
                    Ok(_) => info!(url = %seed.url, "Registered default source"),
                    Err(e) => warn!(url = %seed.url, error = %e, "Skipping default source"),
                }
            }
        }

        Ok(registry)
    }

    /// All sources in insertion order
    pub async fn list(&self) -> Vec<Source> {
        self.sources.lock().await.clone()
    }

    /// Number of sources
    pub async fn len(&self) -> usize {
        self.sources.lock().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sources.lock().await.is_empty()
    }

    /// The source registered under `url`
    pub async fn get(&self, url: &str) -> Option<Source> {
        let key = source_key(url);
        self.sources
            .lock()
            .await
            .iter()
            .find(|source| source.url == key)
            .cloned()
    }

    /// Whether a source is registered under `url`
    pub async fn contains(&self, url: &str) -> bool {
        self.get(url).await.is_some()
    }

    /// Sources with [`SourceStatus::Active`], in insertion order
    pub async fn active(&self) -> Vec<Source> {
        self.sources
            .lock()
            .await
            .iter()
            .filter(|source| source.status == SourceStatus::Active)
            .cloned()
            .collect()
    }

    /// Register a new source
    #[instrument(skip_all, fields(url = %new.url))]
    pub async fn add(&self, new: NewSource) -> Result<Committed<Source>, RegistryError> {
        let url = canonical_url(&new.url)?;

        let mut sources = self.sources.lock().await;
        if sources.iter().any(|source| source.url == url) {
            return Err(RegistryError::Duplicate(url));
        }

        let source = Source {
            url,
            name: new.name,
            description: new.description,
            category: new.category,
            language: new.language,
            added: Local::now().date_naive(),
            status: SourceStatus::Active,
        };
        sources.push(source.clone());
        info!("Source added: {} ({})", source.name, source.url);

        let written = write_json_atomic(&self.path, &*sources).await;
        Ok(Committed::new(source, written))
    }

    /// Change the descriptive fields of a source
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        url: &str,
        update: SourceUpdate,
    ) -> Result<Committed<Source>, RegistryError> {
        let key = source_key(url);

        let mut sources = self.sources.lock().await;
        let source = sources
            .iter_mut()
            .find(|source| source.url == key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        update.apply(source);
        let updated = source.clone();
        info!("Source updated: {}", updated.name);

        let written = write_json_atomic(&self.path, &*sources).await;
        Ok(Committed::new(updated, written))
    }

    /// Remove a source
    #[instrument(skip(self))]
    pub async fn delete(&self, url: &str) -> Result<Committed<Source>, RegistryError> {
        let key = source_key(url);

        let mut sources = self.sources.lock().await;
        let position = sources
            .iter()
            .position(|source| source.url == key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        let removed = sources.remove(position);
        info!("Source deleted: {}", removed.name);

        let written = write_json_atomic(&self.path, &*sources).await;
        Ok(Committed::new(removed, written))
    }
}
