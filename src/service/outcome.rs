//! Result records returned by the service operations

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::registry::Source;

/// Result of a registry mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Whether the operation was applied
    pub success: bool,

    /// Human readable summary
    pub message: String,

    /// The source as stored after the operation
    pub source: Option<Source>,

    /// Whether the change reached disk
    pub durable: bool,
}

impl Outcome {
    pub(crate) fn applied(
        message: impl Into<String>,
        source: Source,
        persist_error: Option<String>,
    ) -> Self {
        let mut message = message.into();
        if let Some(reason) = &persist_error {
            message = format!("{} (not saved: {})", message, reason);
        }
        Self {
            success: true,
            message,
            source: Some(source),
            durable: persist_error.is_none(),
        }
    }

    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            source: None,
            durable: true,
        }
    }
}

/// Result of indexing one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexOutcome {
    /// Whether the crawl extracted pages and the source was recorded
    pub success: bool,

    /// Human readable summary
    pub message: String,

    /// Source URL
    pub url: String,

    /// Documents accepted by the collection
    pub documents_indexed: usize,

    /// URLs requested during the crawl
    pub pages_processed: usize,

    /// Batches the collection rejected
    pub failed_batches: usize,

    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,

    /// When the source had been indexed before this run
    #[serde(serialize_with = "serialize_optional_stamp")]
    pub previously_indexed: Option<NaiveDateTime>,

    /// Whether the index record reached disk
    pub durable: bool,
}

fn serialize_optional_stamp<S>(at: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match at {
        Some(at) => serializer.serialize_some(&crate::timestamp::format(at)),
        None => serializer.serialize_none(),
    }
}

/// How a source fared during a full re-index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Pages were extracted and recorded
    Succeeded,
    /// The crawl failed or extracted nothing
    Failed,
}

/// Per-source line of an [`AggregateOutcome`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    /// Source name
    pub name: String,

    /// Source URL
    pub url: String,

    /// Outcome
    pub status: ReportStatus,

    /// Documents indexed
    pub documents: usize,

    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,

    /// Failure reason
    pub error: Option<String>,
}

/// Result of re-indexing every active source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateOutcome {
    /// Active sources when the run started
    pub total_sources: usize,

    /// Sources whose crawl extracted at least one page
    pub succeeded: usize,

    /// Sources whose crawl failed or extracted nothing
    pub failed: usize,

    /// Documents indexed across all sources
    pub total_documents: usize,

    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,

    /// Whether the run was cut short
    pub cancelled: bool,

    /// One entry per source attempted, in registry order
    pub details: Vec<SourceReport>,
}

/// Registry and collection statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    /// Registered sources
    pub total_sources: usize,

    /// Sources with status active
    pub active_sources: usize,

    /// Sources with an index record
    pub indexed_sources: usize,

    /// Documents in the collection
    pub total_documents: usize,

    /// Sources per category
    pub categories: BTreeMap<String, usize>,

    /// Sources per language tag
    pub languages: BTreeMap<String, usize>,

    /// When the statistics were taken
    #[serde(with = "crate::timestamp::serde_format")]
    pub generated_at: NaiveDateTime,
}
