//! Crawl run ledger models.
//!
//! A `CrawlerRun` row is created per crawl attempt and mutated in place as
//! the run moves through stages; it is never deleted. A retried crawl gets a
//! fresh row rather than reopening a terminal one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::site::ConfigSnapshot;

/// Lifecycle status of a crawl run.
///
/// `Running` is the only non-terminal state. Free-text status tokens from
/// the legacy schema are rejected at the persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One crawl invocation of a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerRun {
    /// Ledger key for this run.
    pub crawler_id: i64,
    /// Site being crawled.
    pub site_id: i64,
    /// Ordinal pipeline phase, monotonically non-decreasing.
    pub stage: i64,
    /// Crawler script or module file that drove the run.
    pub crawler_file: String,
    /// Kind of data the run produced (pages, files, ...).
    pub data_type: String,
    pub last_run_start: DateTime<Utc>,
    pub last_run_end: Option<DateTime<Utc>>,
    pub run_status: RunStatus,
    /// Config flags frozen at start time.
    pub config: ConfigSnapshot,
    /// Free-text progress log, appended to by stage advances.
    pub run_details: String,
}

/// Per-run progress cursor: at most one row per crawler_id, overwritten as
/// pages are processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryCursor {
    pub crawler_id: i64,
    pub page: i64,
    pub ad_number: i64,
}

/// Checkpoint of the last successfully completed geography unit for a site.
///
/// Append-only; the current checkpoint is the most recently inserted row
/// (by id ordering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: i64,
    pub site_id: i64,
    pub county: String,
    pub city: String,
    pub zipcode: String,
    pub data_url: String,
}

/// Append-only marker that a full county crawl finished for a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyCrawl {
    pub id: i64,
    pub site_id: i64,
    pub date_time: DateTime<Utc>,
}

/// Crawl-level error log entry, surfaced on the admin errors endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlError {
    pub id: i64,
    pub site_id: i64,
    pub date_time: DateTime<Utc>,
    pub text: String,
}
