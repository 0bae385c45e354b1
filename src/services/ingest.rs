//! Ingest orchestration: drive one linkage pass over a site's unparsed
//! captures, maintaining the run ledger, progress cursor, and checkpoints.

use std::sync::Arc;

use chrono::Utc;

use crate::models::{LinkageOutcome, RunStatus, Site};
use crate::repository::{
    CaptureRepository, CheckpointRepository, LinkageRepository, Result, RunRepository,
    SiteRepository,
};
use crate::services::LinkageEngine;

const CLAIM_BATCH: u32 = 100;

/// Outcome counters for a completed ingest pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RunSummary {
    pub crawler_id: i64,
    pub processed: u64,
    pub linked: u64,
    pub skipped: u64,
    pub quarantined: u64,
    pub errors: u64,
    pub status: Option<RunStatus>,
}

/// Orchestrates linkage passes against the ledgers.
pub struct IngestService {
    sites: Arc<SiteRepository>,
    runs: Arc<RunRepository>,
    captures: Arc<CaptureRepository>,
    checkpoints: Arc<CheckpointRepository>,
    linkage: Arc<LinkageRepository>,
    engine: LinkageEngine,
    /// Checkpoint after this many processed captures.
    checkpoint_interval: u64,
}

impl IngestService {
    pub fn new(
        sites: Arc<SiteRepository>,
        runs: Arc<RunRepository>,
        captures: Arc<CaptureRepository>,
        checkpoints: Arc<CheckpointRepository>,
        linkage: Arc<LinkageRepository>,
        engine: LinkageEngine,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            sites,
            runs,
            captures,
            checkpoints,
            linkage,
            engine,
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Run a full linkage pass over a site's unparsed page captures.
    ///
    /// Opens a run in the ledger, links each capture, advances the cursor,
    /// checkpoints every `checkpoint_interval` captures, and closes the run
    /// with success/partial/failed. Capture-level failures are logged to the
    /// errors ledger and do not abort the pass.
    pub fn process_site(&self, site: &Site, limit: u64) -> Result<RunSummary> {
        let config = self.sites.get_config(site.id)?;
        let crawler_id =
            self.runs
                .start_run(site.id, &site.module, "pages", &config.snapshot())?;

        tracing::info!(
            site_id = site.id,
            crawler_id,
            crawler = %site.crawler_name,
            "starting linkage pass"
        );

        let mut summary = RunSummary {
            crawler_id,
            ..Default::default()
        };

        self.runs.advance_stage(crawler_id, 1, "linking captures")?;

        let mut since_checkpoint = 0u64;
        let mut last_seen: Option<(Option<String>, String)> = None;
        'pass: loop {
            let batch = self.captures.unparsed_pages(site.id, CLAIM_BATCH)?;
            if batch.is_empty() {
                break;
            }

            for capture in batch {
                if limit > 0 && summary.processed >= limit {
                    break 'pass;
                }

                match self.engine.link_page(&capture) {
                    Ok(outcome) => {
                        match outcome {
                            LinkageOutcome::Linked { .. } => summary.linked += 1,
                            LinkageOutcome::Skipped => summary.skipped += 1,
                            LinkageOutcome::Quarantined => summary.quarantined += 1,
                        }
                        self.captures.mark_page_parsed(capture.id)?;
                    }
                    Err(e) => {
                        summary.errors += 1;
                        tracing::error!(
                            site_id = site.id,
                            capture_id = capture.id,
                            error = %e,
                            "linkage failed for capture"
                        );
                        self.linkage.record_error(
                            site.id,
                            &format!("linkage failed for {}: {}", capture.url, e),
                        )?;
                        // Leave the capture unparsed only if nothing was
                        // written for it; quarantine it so the pass moves on.
                        self.linkage
                            .record_erroneous_link(None, None, &capture.url)?;
                        self.captures.mark_page_parsed(capture.id)?;
                    }
                }

                summary.processed += 1;
                since_checkpoint += 1;
                self.runs
                    .advance_cursor(crawler_id, capture.id, summary.processed as i64)?;

                if since_checkpoint >= self.checkpoint_interval {
                    self.checkpoint(site.id, &capture.address, &capture.url)?;
                    since_checkpoint = 0;
                }
                last_seen = Some((capture.address.clone(), capture.url.clone()));
            }
        }

        // Final checkpoint so a follow-up crawl resumes past this pass.
        if since_checkpoint > 0 {
            if let Some((address, url)) = last_seen {
                self.checkpoint(site.id, &address, &url)?;
            }
        }

        self.runs.advance_stage(crawler_id, 2, "finalizing")?;

        let status = if summary.errors > 0 {
            RunStatus::Failed
        } else if summary.quarantined > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        if status == RunStatus::Success {
            self.checkpoints.mark_county_complete(site.id)?;
        }
        self.runs.complete_run(crawler_id, status)?;
        self.sites.update_last_run(site.id, Utc::now())?;

        summary.status = Some(status);
        tracing::info!(
            site_id = site.id,
            crawler_id,
            processed = summary.processed,
            linked = summary.linked,
            skipped = summary.skipped,
            quarantined = summary.quarantined,
            errors = summary.errors,
            status = status.as_str(),
            "linkage pass complete"
        );
        Ok(summary)
    }

    fn checkpoint(&self, site_id: i64, address: &Option<String>, url: &str) -> Result<()> {
        use crate::utils::address::parse_address;

        let parsed = address.as_deref().and_then(parse_address);
        let (county, city, zip) = match parsed {
            Some(addr) => (String::new(), addr.city, addr.zip),
            None => (String::new(), String::new(), String::new()),
        };
        self.checkpoints
            .record_checkpoint(site_id, &county, &city, &zip, url)
    }
}
