//! Site registry models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A target data source: one county or auctioneer site.
///
/// `module` names the parser that understands this site's markup;
/// `priority` orders crawl scheduling (lower runs first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Database row ID.
    pub id: i64,
    /// Optional site group for shared scheduling.
    pub group_id: Option<i64>,
    /// Root URL of the source.
    pub url: String,
    /// Parser module identifier.
    pub module: String,
    /// Format hint for owner extraction.
    pub owner_format: Option<String>,
    /// Format hint for property extraction.
    pub property_format: Option<String>,
    /// Comma-separated list of tables this site's parser writes.
    pub tables_to_use: Option<String>,
    /// When the last crawl of this site finished.
    pub last_run: Option<DateTime<Utc>>,
    /// Scheduling priority; lower runs first.
    pub priority: i64,
    /// Human-readable crawler name.
    pub crawler_name: String,
}

impl Site {
    pub fn new(url: impl Into<String>, module: impl Into<String>, crawler_name: impl Into<String>) -> Self {
        Self {
            id: 0, // Set by database
            group_id: None,
            url: url.into(),
            module: module.into(),
            owner_format: None,
            property_format: None,
            tables_to_use: None,
            last_run: None,
            priority: 100,
            crawler_name: crawler_name.into(),
        }
    }
}

/// Per-site crawl configuration. Exactly one row per site.
///
/// Persisted as 'Y'/'N' characters for compatibility with the legacy
/// `crawler_config` table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub site_id: i64,
    /// Route fetches through a proxy.
    pub proxy: bool,
    /// Insert a delay between fetches.
    pub time_delay: bool,
    /// Allow intra-site fetch concurrency.
    pub threads: bool,
    /// Rotate through the proxy pool.
    pub rotate_proxies: bool,
}

impl CrawlerConfig {
    pub fn for_site(site_id: i64) -> Self {
        Self {
            site_id,
            ..Default::default()
        }
    }

    /// Snapshot the flags as they are recorded on a crawler run row.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            proxy: yn(self.proxy).to_string(),
            rotate_proxy: yn(self.rotate_proxies).to_string(),
            time_delay: yn(self.time_delay).to_string(),
            enable: "Y".to_string(),
        }
    }
}

/// Stringified config flags frozen onto a crawler run at start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub proxy: String,
    pub rotate_proxy: String,
    pub time_delay: String,
    pub enable: String,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        CrawlerConfig::default().snapshot()
    }
}

pub(crate) fn yn(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

pub(crate) fn from_yn(s: &str) -> bool {
    s.eq_ignore_ascii_case("y")
}
