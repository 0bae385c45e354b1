//! End-to-end tests for the ingest and record-linkage pipeline against a
//! temporary SQLite database.

use tempfile::TempDir;

use leadacquire::config::{Repositories, Settings};
use leadacquire::models::{
    ConfigSnapshot, LinkageOutcome, ParseState, RunStatus, Site, SkipRule,
};

fn test_settings() -> (TempDir, Settings) {
    let dir = TempDir::new().expect("create temp dir");
    let settings = Settings {
        data_dir: dir.path().to_path_buf(),
        db_path: dir.path().join("test.db"),
        checkpoint_interval: 2,
        match_threshold: 0.90,
    };
    (dir, settings)
}

fn open(settings: &Settings) -> Repositories {
    settings.open_repositories().expect("open repositories")
}

fn add_site(repos: &Repositories) -> Site {
    let site = Site::new("https://county.example.gov", "county_v1", "county");
    let id = repos.sites.save(&site).expect("save site");
    repos.sites.get(id).expect("get site").expect("site exists")
}

#[test]
fn run_stage_is_monotonic_and_locks_after_completion() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);

    let id = repos
        .runs
        .start_run(site.id, "county_v1", "pages", &ConfigSnapshot::default())
        .unwrap();

    let run = repos.runs.get(id).unwrap().unwrap();
    assert_eq!(run.stage, 0);
    assert_eq!(run.run_status, RunStatus::Running);
    assert!(run.last_run_end.is_none());

    repos.runs.advance_stage(id, 2, "fetching").unwrap();
    assert_eq!(repos.runs.get(id).unwrap().unwrap().stage, 2);

    // Regressions are ignored
    repos.runs.advance_stage(id, 1, "backwards").unwrap();
    assert_eq!(repos.runs.get(id).unwrap().unwrap().stage, 2);

    repos.runs.complete_run(id, RunStatus::Success).unwrap();
    let run = repos.runs.get(id).unwrap().unwrap();
    assert_eq!(run.run_status, RunStatus::Success);
    assert!(run.last_run_end.is_some());

    // Terminal runs no longer advance
    repos.runs.advance_stage(id, 5, "too late").unwrap();
    assert_eq!(repos.runs.get(id).unwrap().unwrap().stage, 2);

    // And stay terminal
    repos.runs.complete_run(id, RunStatus::Failed).unwrap();
    assert_eq!(
        repos.runs.get(id).unwrap().unwrap().run_status,
        RunStatus::Success
    );
}

#[test]
fn advance_stage_on_unknown_run_is_a_noop() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    repos.runs.advance_stage(9999, 3, "ghost").unwrap();
    assert!(repos.runs.get(9999).unwrap().is_none());
}

#[test]
fn cursor_is_upserted_not_appended() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let id = repos
        .runs
        .start_run(site.id, "county_v1", "pages", &ConfigSnapshot::default())
        .unwrap();

    repos.runs.advance_cursor(id, 1, 10).unwrap();
    repos.runs.advance_cursor(id, 2, 25).unwrap();

    let cursor = repos.runs.get_cursor(id).unwrap().unwrap();
    assert_eq!(cursor.page, 2);
    assert_eq!(cursor.ad_number, 25);

    // Terminal runs stop accepting cursor updates
    repos.runs.complete_run(id, RunStatus::Partial).unwrap();
    repos.runs.advance_cursor(id, 3, 40).unwrap();
    let cursor = repos.runs.get_cursor(id).unwrap().unwrap();
    assert_eq!(cursor.page, 2);
}

#[test]
fn capture_page_is_idempotent_per_site_and_url() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);

    let first = repos
        .captures
        .capture_page(site.id, "http://a/b", "body text")
        .unwrap();
    assert_eq!(first.parsed, ParseState::Unparsed);

    let second = repos
        .captures
        .capture_page(site.id, "http://a/b", "body text")
        .unwrap();
    assert_eq!(first.id, second.id);

    let stats = repos.captures.stats(site.id).unwrap();
    assert_eq!(stats.pages_total, 1);
    assert_eq!(stats.pages_unparsed, 1);

    // Same URL on a different site is a distinct capture
    let other = repos
        .captures
        .capture_page(site.id + 1, "http://a/b", "body text")
        .unwrap();
    assert_ne!(first.id, other.id);
}

#[test]
fn capture_file_dedups_identical_content_across_urls() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);

    let a = repos
        .captures
        .capture_file(site.id, None, "http://x/doc1.pdf", "same bytes")
        .unwrap();
    let b = repos
        .captures
        .capture_file(site.id, None, "http://x/doc2.pdf", "same bytes")
        .unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.html_md5, b.html_md5);

    let c = repos
        .captures
        .capture_file(site.id, None, "http://x/doc3.pdf", "different bytes")
        .unwrap();
    assert_ne!(a.id, c.id);
}

#[test]
fn mark_parsed_is_one_way() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);

    let page = repos
        .captures
        .capture_page(site.id, "http://a/1", "x")
        .unwrap();
    repos.captures.mark_page_parsed(page.id).unwrap();
    repos.captures.mark_page_parsed(page.id).unwrap();

    let page = repos.captures.get_page(page.id).unwrap().unwrap();
    assert_eq!(page.parsed, ParseState::Parsed);
    assert!(repos.captures.unparsed_pages(site.id, 10).unwrap().is_empty());
}

#[test]
fn listing_id_maps_to_exactly_one_property() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let engine = repos.engine(settings.match_threshold);

    let mut ids = Vec::new();
    for url in ["http://a/1", "http://a/2"] {
        let page = repos.captures.capture_page(site.id, url, "x").unwrap();
        repos
            .captures
            .set_page_extraction(
                page.id,
                Some("123 Main St, Dallas, TX 75201"),
                Some("John Smith"),
                None,
                None,
                Some("L-100"),
                None,
            )
            .unwrap();
        let page = repos.captures.get_page(page.id).unwrap().unwrap();
        match engine.link_page(&page).unwrap() {
            LinkageOutcome::Linked { proaddress_id, .. } => ids.push(proaddress_id),
            other => panic!("expected link, got {:?}", other),
        }
    }

    assert_eq!(ids[0], ids[1]);
    let prop = repos
        .linkage
        .find_property_by_listing(site.id, "L-100")
        .unwrap()
        .unwrap();
    assert_eq!(prop.id, ids[0]);
    assert_eq!(prop.street_name, "MAIN STREET");
}

#[test]
fn owner_hash_dedup_mirrors_listing_dedup() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let engine = repos.engine(settings.match_threshold);

    let mut owner_ids = Vec::new();
    for (url, owner) in [
        ("http://a/1", "Smith, John"),
        ("http://a/2", "smith john"),
    ] {
        let page = repos.captures.capture_page(site.id, url, "x").unwrap();
        repos
            .captures
            .set_page_extraction(
                page.id,
                Some("123 Main St, Dallas, TX 75201"),
                Some(owner),
                None,
                None,
                Some("L-200"),
                None,
            )
            .unwrap();
        let page = repos.captures.get_page(page.id).unwrap().unwrap();
        match engine.link_page(&page).unwrap() {
            LinkageOutcome::Linked { ownername_id, .. } => {
                owner_ids.push(ownername_id.expect("owner resolved"))
            }
            other => panic!("expected link, got {:?}", other),
        }
    }

    // "Smith, John" and "smith john" normalize to the same fingerprint
    assert_eq!(owner_ids[0], owner_ids[1]);
}

#[test]
fn fuzzy_address_fallback_links_abbreviation_variants() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let engine = repos.engine(settings.match_threshold);

    // First capture creates the property via its listing id.
    let page = repos.captures.capture_page(site.id, "http://a/1", "x").unwrap();
    repos
        .captures
        .set_page_extraction(
            page.id,
            Some("55 Oak Blvd, Dallas, TX 75001"),
            None,
            None,
            None,
            Some("L-300"),
            None,
        )
        .unwrap();
    let page = repos.captures.get_page(page.id).unwrap().unwrap();
    let first = match engine.link_page(&page).unwrap() {
        LinkageOutcome::Linked { proaddress_id, .. } => proaddress_id,
        other => panic!("expected link, got {:?}", other),
    };

    // Second capture has no listing id and an abbreviated rendering.
    let page = repos.captures.capture_page(site.id, "http://b/1", "y").unwrap();
    repos
        .captures
        .set_page_extraction(
            page.id,
            Some("55 Oak Boulevard, Dallas TX 75001"),
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap();
    let page = repos.captures.get_page(page.id).unwrap().unwrap();
    match engine.link_page(&page).unwrap() {
        LinkageOutcome::Linked {
            proaddress_id,
            matched_existing,
            ..
        } => {
            assert_eq!(proaddress_id, first);
            assert!(matched_existing);
        }
        other => panic!("expected link, got {:?}", other),
    }
}

#[test]
fn skip_rule_suppresses_all_linkage_output() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let engine = repos.engine(settings.match_threshold);

    repos
        .linkage
        .save_skip_rule(&SkipRule {
            id: 0,
            name: Some("known commercial parcel".into()),
            street_num: "900".into(),
            street_name: "COMMERCE STREET".into(),
            zip: "75202".into(),
            county: None,
            skip: true,
            kind: Some("COM".into()),
        })
        .unwrap();

    let page = repos.captures.capture_page(site.id, "http://a/9", "x").unwrap();
    repos
        .captures
        .set_page_extraction(
            page.id,
            Some("900 Commerce St, Dallas, TX 75202"),
            Some("Acme Corp"),
            None,
            None,
            Some("L-900"),
            None,
        )
        .unwrap();
    let page = repos.captures.get_page(page.id).unwrap().unwrap();

    assert_eq!(engine.link_page(&page).unwrap(), LinkageOutcome::Skipped);

    // No property, no owner, and no quarantine row either
    assert!(repos
        .linkage
        .find_property_by_listing(site.id, "L-900")
        .unwrap()
        .is_none());
    assert!(repos.linkage.list_erroneous(10).unwrap().is_empty());
}

#[test]
fn unresolvable_capture_is_quarantined() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let engine = repos.engine(settings.match_threshold);

    let page = repos.captures.capture_page(site.id, "http://a/z", "x").unwrap();
    repos
        .captures
        .set_page_extraction(page.id, Some("no number here"), None, None, None, None, None)
        .unwrap();
    let page = repos.captures.get_page(page.id).unwrap().unwrap();

    assert_eq!(engine.link_page(&page).unwrap(), LinkageOutcome::Quarantined);

    let quarantined = repos.linkage.list_erroneous(10).unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].url, "http://a/z");
}

#[test]
fn checkpoints_are_append_only_and_site_isolated() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);

    assert!(repos.checkpoints.last_checkpoint(1).unwrap().is_none());

    repos
        .checkpoints
        .record_checkpoint(1, "Dallas", "Dallas", "75201", "http://x/1")
        .unwrap();
    let cp = repos.checkpoints.last_checkpoint(1).unwrap().unwrap();
    assert_eq!(cp.county, "Dallas");
    assert_eq!(cp.data_url, "http://x/1");

    // A checkpoint for another site does not affect site 1
    repos
        .checkpoints
        .record_checkpoint(2, "Tarrant", "Fort Worth", "76101", "http://y/1")
        .unwrap();
    let cp = repos.checkpoints.last_checkpoint(1).unwrap().unwrap();
    assert_eq!(cp.data_url, "http://x/1");

    // New checkpoints append; history keeps prior rows
    repos
        .checkpoints
        .record_checkpoint(1, "Dallas", "Irving", "75060", "http://x/2")
        .unwrap();
    let history = repos.checkpoints.history(1, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].data_url, "http://x/2");
    assert_eq!(history[1].data_url, "http://x/1");
    assert!(history[0].id > history[1].id);
}

#[test]
fn county_completion_log_tracks_latest() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);

    assert!(repos.checkpoints.last_county_crawl(1).unwrap().is_none());
    repos.checkpoints.mark_county_complete(1).unwrap();
    assert!(repos.checkpoints.last_county_crawl(1).unwrap().is_some());
    assert!(repos.checkpoints.last_county_crawl(2).unwrap().is_none());
}

#[test]
fn ingest_pass_links_and_closes_the_run() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);
    let site = add_site(&repos);
    let ingest = repos.ingest(&settings);

    for i in 0..3 {
        let page = repos
            .captures
            .capture_page(site.id, &format!("http://a/{}", i), "x")
            .unwrap();
        repos
            .captures
            .set_page_extraction(
                page.id,
                Some(&format!("{} Elm St, Dallas, TX 75201", 100 + i)),
                Some("Jane Doe"),
                None,
                None,
                Some(&format!("L-{}", i)),
                None,
            )
            .unwrap();
    }

    let summary = ingest.process_site(&site, 0).unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.linked, 3);
    assert_eq!(summary.status, Some(RunStatus::Success));

    let run = repos.runs.get(summary.crawler_id).unwrap().unwrap();
    assert_eq!(run.run_status, RunStatus::Success);
    assert!(run.last_run_end.is_some());

    // checkpoint_interval=2 in test settings: mid-pass plus final checkpoint
    let history = repos.checkpoints.history(site.id, 10).unwrap();
    assert_eq!(history.len(), 2);

    // All captures consumed; a second pass finds nothing
    let again = ingest.process_site(&site, 0).unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(again.status, Some(RunStatus::Success));

    // last_run recorded on the site
    let site = repos.sites.get(site.id).unwrap().unwrap();
    assert!(site.last_run.is_some());
}

#[test]
fn site_registry_roundtrip_and_config_defaults() {
    let (_dir, settings) = test_settings();
    let repos = open(&settings);

    let mut site = Site::new("https://tax.example.gov", "tax_v2", "tax sale");
    site.priority = 5;
    let id = repos.sites.save(&site).unwrap();

    // Saving the same (url, module) again updates in place
    site.priority = 7;
    let id2 = repos.sites.save(&site).unwrap();
    assert_eq!(id, id2);
    assert_eq!(repos.sites.get(id).unwrap().unwrap().priority, 7);

    // Config defaults to all flags off when no row exists
    let config = repos.sites.get_config(id).unwrap();
    assert!(!config.proxy && !config.time_delay && !config.threads);
}
