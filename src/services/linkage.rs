//! Record linkage: resolve raw captures into normalized property and owner
//! entities without creating duplicates.
//!
//! Resolution order per capture:
//! 1. skip-list check on the address signature,
//! 2. exact listing-id match,
//! 3. structured-address fallback with fuzzy street-name comparison,
//! 4. insert a new entity, or quarantine when nothing can be trusted.
//!
//! Existing entities are never mutated; linkage is append-and-link.

use std::sync::Arc;

use strsim::jaro_winkler;

use crate::models::{
    FileCapture, LinkageOutcome, MotiveType, OwnerRecord, PageCapture, PropertyRecord,
};
use crate::repository::{CaptureRepository, LinkageRepository, Result};
use crate::utils::address::{normalize_name, parse_address, ParsedAddress};

/// Default acceptance threshold for fuzzy street-name comparison.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.90;

/// Record linkage engine over the capture and linkage stores.
pub struct LinkageEngine {
    linkage: Arc<LinkageRepository>,
    captures: Arc<CaptureRepository>,
    threshold: f64,
}

impl LinkageEngine {
    pub fn new(linkage: Arc<LinkageRepository>, captures: Arc<CaptureRepository>) -> Self {
        Self {
            linkage,
            captures,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Override the fuzzy-match acceptance threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Link a page capture from its denormalized extraction fields.
    pub fn link_page(&self, capture: &PageCapture) -> Result<LinkageOutcome> {
        self.resolve(
            capture.site_id,
            &capture.url,
            capture.address.as_deref(),
            capture.owner.as_deref(),
            capture.listing_id.as_deref(),
            capture.motive_type,
            Some(capture.id),
        )
    }

    /// Link a file capture using extraction fields supplied by its parser,
    /// then point the file at the resolved rows.
    pub fn link_file(
        &self,
        capture: &FileCapture,
        address: Option<&str>,
        owner: Option<&str>,
        listing_id: Option<&str>,
    ) -> Result<LinkageOutcome> {
        let outcome = self.resolve(
            capture.site_id,
            &capture.url,
            address,
            owner,
            listing_id,
            capture.motive_type,
            None,
        )?;

        if let LinkageOutcome::Linked {
            proaddress_id,
            ownername_id,
            ..
        } = outcome
        {
            self.captures
                .link_file(capture.id, Some(proaddress_id), ownername_id)?;
        }
        Ok(outcome)
    }

    fn resolve(
        &self,
        site_id: i64,
        url: &str,
        address: Option<&str>,
        owner: Option<&str>,
        listing_id: Option<&str>,
        motive_type: Option<MotiveType>,
        page_id: Option<i64>,
    ) -> Result<LinkageOutcome> {
        let parsed = address.and_then(parse_address);

        // Skip-listed addresses produce nothing, not even a quarantine row.
        if let Some(ref addr) = parsed {
            if self
                .linkage
                .is_skipped(&addr.street_num, &addr.street_name, &addr.zip, None)?
            {
                tracing::debug!(site_id, url, "capture suppressed by skip rule");
                return Ok(LinkageOutcome::Skipped);
            }
        }

        // Fast path: exact listing-id match.
        if let Some(listing) = listing_id {
            if let Some(existing) = self.linkage.find_property_by_listing(site_id, listing)? {
                let ownername_id = self.resolve_owner(
                    site_id,
                    owner,
                    parsed.as_ref(),
                    &existing,
                    motive_type,
                    page_id,
                )?;
                return Ok(LinkageOutcome::Linked {
                    proaddress_id: existing.id,
                    ownername_id,
                    matched_existing: true,
                });
            }
        }

        // Everything past here needs a parsable address.
        let addr = match parsed {
            Some(addr) => addr,
            None => {
                tracing::warn!(site_id, url, "capture has no usable address; quarantined");
                self.linkage.record_erroneous_link(None, None, url)?;
                return Ok(LinkageOutcome::Quarantined);
            }
        };

        // Structured-address fallback: same street number and zip, fuzzy
        // street name.
        if let Some(existing) = self.find_by_address(site_id, &addr)? {
            let ownername_id =
                self.resolve_owner(site_id, owner, Some(&addr), &existing, motive_type, page_id)?;
            return Ok(LinkageOutcome::Linked {
                proaddress_id: existing.id,
                ownername_id,
                matched_existing: true,
            });
        }

        // No match anywhere: this capture defines a new property.
        let record = PropertyRecord {
            id: 0,
            site_id,
            listing_id: listing_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("addr:{}", addr.signature())),
            street_num: addr.street_num.clone(),
            street_name: addr.street_name.clone(),
            backup_street_name: None,
            city: addr.city.clone(),
            state: addr.state.clone(),
            zip: addr.zip.clone(),
            beds: None,
            baths: None,
            sqft: None,
            price: None,
            motive_type,
        };
        let (proaddress_id, created) = self.linkage.upsert_property(&record)?;

        let property = self.linkage.get_property(proaddress_id)?.unwrap_or(record);
        let ownername_id =
            self.resolve_owner(site_id, owner, Some(&addr), &property, motive_type, page_id)?;

        Ok(LinkageOutcome::Linked {
            proaddress_id,
            ownername_id,
            matched_existing: !created,
        })
    }

    /// Fuzzy candidate search: exact street number + zip, street name within
    /// the similarity threshold against the primary or backup name.
    fn find_by_address(
        &self,
        site_id: i64,
        addr: &ParsedAddress,
    ) -> Result<Option<PropertyRecord>> {
        let candidates =
            self.linkage
                .candidate_properties(site_id, &addr.street_num, &addr.zip)?;

        let mut best: Option<(f64, PropertyRecord)> = None;
        for candidate in candidates {
            let primary = jaro_winkler(&addr.street_name, &candidate.street_name);
            let backup = candidate
                .backup_street_name
                .as_deref()
                .map(|name| jaro_winkler(&addr.street_name, name))
                .unwrap_or(0.0);
            let score = primary.max(backup);

            if score >= self.threshold
                && best.as_ref().map_or(true, |(top, _)| score > *top)
            {
                best = Some((score, candidate));
            }
        }

        Ok(best.map(|(_, record)| record))
    }

    /// Dedup owners by content fingerprint, mirroring the listing-id fast
    /// path for properties.
    fn resolve_owner(
        &self,
        site_id: i64,
        owner: Option<&str>,
        addr: Option<&ParsedAddress>,
        property: &PropertyRecord,
        motive_type: Option<MotiveType>,
        page_id: Option<i64>,
    ) -> Result<Option<i64>> {
        let name = match owner.map(normalize_name).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => return Ok(None),
        };

        let signature = addr.map(|a| a.signature()).unwrap_or_else(|| {
            format!(
                "{}|{}|{}",
                property.street_num, property.street_name, property.zip
            )
        });

        let record = OwnerRecord {
            id: 0,
            site_id,
            full_name: name.clone(),
            motive_type,
            hash: OwnerRecord::compute_hash(&name, &signature),
            page_id,
        };
        let (id, _created) = self.linkage.upsert_owner(&record)?;
        Ok(Some(id))
    }
}
