//! Core domain types shared by every LeadScout crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

/// A provider credential. Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for placing in request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ---------------------------------------------------------------------------
// LeadStatus
// ---------------------------------------------------------------------------

/// Status label for a lead with a resolved profile.
pub const STATUS_FOUND: &str = "Found";

/// Status label prefix for a lead that could not be resolved.
pub const STATUS_NOT_FOUND: &str = "Not Found";

/// Outcome marker stored in the status column of a lead row.
///
/// Only `Unset` rows are eligible for (re)processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[default]
    Unset,
    Found,
    NotFound,
}

impl LeadStatus {
    /// Parse a status cell. Anything starting with `Not Found` is `NotFound`
    /// (the remainder is a reason); unknown or empty values are `Unset`.
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.starts_with(STATUS_NOT_FOUND) {
            Self::NotFound
        } else if cell.eq_ignore_ascii_case(STATUS_FOUND) {
            Self::Found
        } else {
            Self::Unset
        }
    }

    /// The base label written to the status column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Found => STATUS_FOUND,
            Self::NotFound => STATUS_NOT_FOUND,
        }
    }
}

// ---------------------------------------------------------------------------
// ProfileDetails
// ---------------------------------------------------------------------------

/// Deep-enrichment attributes scraped from a profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub username: String,
    pub full_name: String,
    pub biography: String,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub is_verified: bool,
    pub is_business: bool,
    pub business_category: String,
    pub external_url: String,
}

// ---------------------------------------------------------------------------
// RunStatistics
// ---------------------------------------------------------------------------

/// Aggregate counters for one enrichment invocation.
///
/// Not persisted: the durable record is the per-row status in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Rows in the working set (after `max_rows`).
    pub total: usize,
    /// Rows excluded by the resume planner as already done.
    pub skipped: usize,
    /// Rows processed in this run.
    pub processed: usize,
    pub found: usize,
    /// Rows marked `Not Found` in this run, including malformed rows.
    pub not_found: usize,
    /// Rows whose lookup hit a provider rate limit. Left `Unset` for the next run.
    pub blocked: usize,
    /// Rows that ended without a clean lookup (blocked or malformed).
    pub errors: usize,
    /// Physical search API calls, retries included.
    pub api_requests: u64,
    /// Found rows that received deep profile details.
    pub profiles_enriched: usize,
    /// Found rows whose deep profile scrape failed.
    pub enrich_failures: usize,
    /// Dataset flushes, the final one included.
    pub checkpoints: usize,
}

impl RunStatistics {
    /// Percentage of processed rows that resolved to a profile.
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.found as f64 / self.processed as f64 * 100.0
        }
    }
}
