//! Normalized property/owner entities and linkage bookkeeping.
//!
//! Records here are append-and-link: once a `PropertyRecord` or
//! `OwnerRecord` exists, its identity fields are never mutated, keeping ids
//! stable for downstream foreign keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::motive::MotiveType;

/// Normalized property record derived from one or more raw captures.
///
/// Unique per (site_id, listing_id); one property may fan out to many
/// business rows and file captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: i64,
    pub site_id: i64,
    /// Natural key from the originating auction/court site.
    pub listing_id: String,
    pub street_num: String,
    pub street_name: String,
    /// Fallback street name from the secondary address-parsing pass.
    pub backup_street_name: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub price: Option<f64>,
    pub motive_type: Option<MotiveType>,
}

/// Normalized owner record, deduplicated by content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub id: i64,
    pub site_id: i64,
    pub full_name: String,
    pub motive_type: Option<MotiveType>,
    /// SHA-256 of normalized name + address signature; the fast-path dedup
    /// key for idempotent re-ingestion.
    pub hash: String,
    /// Capture this owner was first extracted from.
    pub page_id: Option<i64>,
}

impl OwnerRecord {
    /// Fingerprint an owner for idempotent re-ingestion.
    pub fn compute_hash(normalized_name: &str, address_signature: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized_name.as_bytes());
        hasher.update(b"|");
        hasher.update(address_signature.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A (property, owner, url) tuple that failed normalization or linkage.
///
/// Quarantine only: rows are written for operator review and never
/// auto-retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErroneousLink {
    pub id: i64,
    pub proaddress_id: Option<i64>,
    pub ownername_id: Option<i64>,
    pub url: String,
}

/// Explicit exclusion entry consulted before linkage.
///
/// A matching signature with `skip` set discards the capture without
/// creating any linkage rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRule {
    pub id: i64,
    pub name: Option<String>,
    pub street_num: String,
    pub street_name: String,
    pub zip: String,
    pub county: Option<String>,
    pub skip: bool,
    /// Exclusion reason code (commercial, duplicate-flagged, ...).
    pub kind: Option<String>,
}

/// Outcome of running linkage over a single capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LinkageOutcome {
    /// Capture resolved to a property (and owner, when one was extracted).
    Linked {
        proaddress_id: i64,
        ownername_id: Option<i64>,
        /// True when the property row already existed.
        matched_existing: bool,
    },
    /// Suppressed by a skip rule; no rows written.
    Skipped,
    /// Could not be confidently resolved; quarantined in erroneous_links.
    Quarantined,
}
