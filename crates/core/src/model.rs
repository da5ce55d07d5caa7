//! Result data model and the persisted state envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ident::{IdRange, ListingId};

/// Current persisted-envelope schema version.
pub const STATE_VERSION: u32 = 1;

/// Classification of one checked listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Found,
    NotFound,
    Challenge,
    Error,
}

/// Parsed outcome of checking one identifier. Immutable once produced;
/// re-checking the same id fully overwrites the cached entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: ListingId,
    pub checked_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub status: ScanStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub inserted_date: Option<String>,
    #[serde(default)]
    pub watchword_found: bool,
    #[serde(default)]
    pub watchword_snippet_html: Option<String>,
}

impl ScanResult {
    /// Terminal result synthesized from a fetch failure.
    pub fn from_failure(id: ListingId, message: impl Into<String>) -> Self {
        Self {
            id,
            checked_at: Utc::now(),
            http_status: None,
            status: ScanStatus::Error,
            error: Some(message.into()),
            final_url: None,
            city: None,
            district: None,
            inserted_date: None,
            watchword_found: false,
            watchword_snippet_html: None,
        }
    }

    /// FOUND, or any result carrying a watchword hit.
    pub fn is_hit(&self) -> bool {
        self.status == ScanStatus::Found || self.watchword_found
    }

    pub fn is_bad(&self) -> bool {
        matches!(self.status, ScanStatus::NotFound | ScanStatus::Challenge | ScanStatus::Error)
    }
}

/// A `ScanResult` tagged with its provenance for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedResult {
    #[serde(flatten)]
    pub result: ScanResult,
    pub from_cache: bool,
}

impl CheckedResult {
    pub fn cached(result: ScanResult) -> Self {
        Self { result, from_cache: true }
    }

    pub fn fresh(result: ScanResult) -> Self {
        Self { result, from_cache: false }
    }
}

/// Filter mode for range-scoped cache listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    #[default]
    All,
    Found,
    Bad,
    None,
}

impl ListMode {
    /// Lenient parse; anything unrecognized means `all`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "found" => ListMode::Found,
            "bad" => ListMode::Bad,
            "none" => ListMode::None,
            _ => ListMode::All,
        }
    }

    pub fn matches(&self, result: &ScanResult) -> bool {
        match self {
            ListMode::All => true,
            ListMode::Found => result.is_hit(),
            ListMode::Bad => result.is_bad(),
            ListMode::None => false,
        }
    }
}

/// Per-category counts over the cached results inside the current range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeStats {
    pub checked: u64,
    pub found: u64,
    pub not_found: u64,
    pub challenge: u64,
    pub error: u64,
    pub bad_total: u64,
}

/// Runtime-mutable settings stored inside the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedConfig {
    #[serde(default)]
    pub min_interval: Option<f64>,
    #[serde(default)]
    pub jitter: Option<(f64, f64)>,
    #[serde(default)]
    pub allowed_rates: Option<Vec<f64>>,
}

/// The persisted state document, written atomically as one JSON file.
///
/// Every field is defaulted so that a partially-valid file still loads;
/// anything unusable falls back to configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateEnvelope {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub config: PersistedConfig,
    #[serde(default)]
    pub range: Option<IdRange>,
    #[serde(default)]
    pub cache: BTreeMap<String, ScanResult>,
}
