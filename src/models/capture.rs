//! Raw capture models for the page and file stores.
//!
//! A capture is immutable once written except for its parse state and the
//! denormalized extraction fields filled in ahead of linkage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::motive::MotiveType;

/// Parse state of a capture. `Unparsed -> Parsed` is the only transition;
/// there is no reprocess path without operator intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
    Unparsed,
    Parsed,
}

impl ParseState {
    /// Legacy 0/1 flag representation used in the `parsed` columns.
    pub fn as_flag(&self) -> i64 {
        match self {
            Self::Unparsed => 0,
            Self::Parsed => 1,
        }
    }

    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(Self::Unparsed),
            1 => Some(Self::Parsed),
            _ => None,
        }
    }
}

/// One crawled HTML/text page, keyed by (site_id, url).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    /// Raw captured text, immutable once written.
    pub content: String,
    pub parsed: ParseState,
    /// Extracted address text pending normalization.
    pub address: Option<String>,
    /// Extracted owner text pending normalization.
    pub owner: Option<String>,
    pub auctioneer: Option<String>,
    pub auction: Option<String>,
    /// Listing identifier from the originating site, when present.
    pub listing_id: Option<String>,
    pub motive_type: Option<MotiveType>,
    /// Free-text parser annotation.
    pub parser_status: Option<String>,
    /// Free-text crawler annotation.
    pub crawler_status: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl PageCapture {
    pub fn new(site_id: i64, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0, // Set by database
            site_id,
            url: url.into(),
            content: content.into(),
            parsed: ParseState::Unparsed,
            address: None,
            owner: None,
            auctioneer: None,
            auction: None,
            listing_id: None,
            motive_type: None,
            parser_status: None,
            crawler_status: None,
            captured_at: Utc::now(),
        }
    }
}

/// A document capture (PDF or other file-based source).
///
/// `html_md5` dedups content-identical files served from different URLs so
/// the normalizer can skip reprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCapture {
    pub id: i64,
    pub site_id: i64,
    pub county_id: Option<i64>,
    pub url: String,
    pub contents: String,
    /// MD5 of `contents`, the content-level dedup key.
    pub html_md5: String,
    pub parsed: ParseState,
    /// Linked property, once linkage resolves.
    pub proaddress_id: Option<i64>,
    /// Linked owner, once linkage resolves.
    pub ownername_id: Option<i64>,
    pub motive_type: Option<MotiveType>,
    pub captured_at: DateTime<Utc>,
}

impl FileCapture {
    /// Compute the MD5 dedup key for file contents.
    pub fn compute_md5(contents: &str) -> String {
        format!("{:x}", md5::compute(contents.as_bytes()))
    }

    pub fn new(
        site_id: i64,
        county_id: Option<i64>,
        url: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        let contents = contents.into();
        Self {
            id: 0, // Set by database
            site_id,
            county_id,
            url: url.into(),
            html_md5: Self::compute_md5(&contents),
            contents,
            parsed: ParseState::Unparsed,
            proaddress_id: None,
            ownername_id: None,
            motive_type: None,
            captured_at: Utc::now(),
        }
    }
}
