//! Normalized property/owner stores plus the quarantine and skip ledgers.
//!
//! Dedup happens inside the database: proaddress is unique per
//! (site_id, listing_id) and ownername per (site_id, hash), and all inserts
//! go through ON CONFLICT upserts, so concurrent linkage passes cannot race
//! a check-then-insert into duplicate entities.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use super::{parse_datetime, to_option, Result};
use crate::models::{CrawlError, ErroneousLink, MotiveType, OwnerRecord, PropertyRecord, SkipRule};

/// SQLite-backed record linkage store.
pub struct LinkageRepository {
    db_path: PathBuf,
}

impl LinkageRepository {
    /// Create a new linkage repository, initializing the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- Normalized property records
            CREATE TABLE IF NOT EXISTS proaddress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                listing_id TEXT NOT NULL,
                PStreetNum TEXT NOT NULL,
                PStreetName TEXT NOT NULL,
                backup_street_name TEXT,
                Pcity TEXT NOT NULL,
                PState TEXT NOT NULL,
                Pzip TEXT NOT NULL,
                beds REAL,
                baths REAL,
                sqft INTEGER,
                price REAL,
                PMotiveType TEXT REFERENCES motive_types(code),

                UNIQUE(site_id, listing_id)
            );

            -- Normalized owner records
            CREATE TABLE IF NOT EXISTS ownername (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                full_name TEXT NOT NULL,
                PMotiveType TEXT REFERENCES motive_types(code),
                hash TEXT NOT NULL,
                page_id INTEGER,

                UNIQUE(site_id, hash)
            );

            -- Quarantine for captures that failed linkage; never auto-retried
            CREATE TABLE IF NOT EXISTS erroneous_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                proaddress_id INTEGER,
                ownername_id INTEGER,
                url TEXT NOT NULL
            );

            -- Explicit exclusion list consulted before linkage
            CREATE TABLE IF NOT EXISTS property_skip (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                street_num TEXT NOT NULL,
                street_name TEXT NOT NULL,
                zip TEXT NOT NULL,
                county TEXT,
                skip INTEGER NOT NULL DEFAULT 1,
                type TEXT
            );

            -- Crawl-level error log
            CREATE TABLE IF NOT EXISTS errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                date_time TEXT NOT NULL,
                text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_proaddress_site_addr
                ON proaddress(site_id, PStreetNum, Pzip);
            CREATE INDEX IF NOT EXISTS idx_property_skip_sig
                ON property_skip(street_num, street_name, zip);
            CREATE INDEX IF NOT EXISTS idx_errors_site
                ON errors(site_id, date_time);
        "#,
        )?;
        Ok(())
    }

    /// Insert a property unless (site_id, listing_id) already exists.
    /// Returns (id, created). Existing rows are never mutated.
    pub fn upsert_property(&self, record: &PropertyRecord) -> Result<(i64, bool)> {
        let conn = self.connect()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO proaddress (
                site_id, listing_id, PStreetNum, PStreetName, backup_street_name,
                Pcity, PState, Pzip, beds, baths, sqft, price, PMotiveType
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(site_id, listing_id) DO NOTHING
            "#,
            params![
                record.site_id,
                record.listing_id,
                record.street_num,
                record.street_name,
                record.backup_street_name,
                record.city,
                record.state,
                record.zip,
                record.beds,
                record.baths,
                record.sqft,
                record.price,
                record.motive_type.map(|m| m.code()),
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM proaddress WHERE site_id = ? AND listing_id = ?",
            params![record.site_id, record.listing_id],
            |row| row.get(0),
        )?;
        Ok((id, inserted > 0))
    }

    /// Exact listing-id match.
    pub fn find_property_by_listing(
        &self,
        site_id: i64,
        listing_id: &str,
    ) -> Result<Option<PropertyRecord>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM proaddress WHERE site_id = ? AND listing_id = ?")?;
        to_option(stmt.query_row(params![site_id, listing_id], row_to_property))
    }

    /// Candidate set for the structured-address fallback: same site, street
    /// number, and zip. Street names are compared fuzzily by the caller.
    pub fn candidate_properties(
        &self,
        site_id: i64,
        street_num: &str,
        zip: &str,
    ) -> Result<Vec<PropertyRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM proaddress WHERE site_id = ? AND PStreetNum = ? AND Pzip = ?",
        )?;
        let rows = stmt
            .query_map(params![site_id, street_num, zip], row_to_property)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get a property by id.
    pub fn get_property(&self, id: i64) -> Result<Option<PropertyRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM proaddress WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_property))
    }

    /// Insert an owner unless (site_id, hash) already exists.
    /// Returns (id, created).
    pub fn upsert_owner(&self, record: &OwnerRecord) -> Result<(i64, bool)> {
        let conn = self.connect()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO ownername (site_id, full_name, PMotiveType, hash, page_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(site_id, hash) DO NOTHING
            "#,
            params![
                record.site_id,
                record.full_name,
                record.motive_type.map(|m| m.code()),
                record.hash,
                record.page_id,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM ownername WHERE site_id = ? AND hash = ?",
            params![record.site_id, record.hash],
            |row| row.get(0),
        )?;
        Ok((id, inserted > 0))
    }

    /// Get an owner by id.
    pub fn get_owner(&self, id: i64) -> Result<Option<OwnerRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM ownername WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_owner))
    }

    /// Quarantine a capture that could not be confidently linked.
    pub fn record_erroneous_link(
        &self,
        proaddress_id: Option<i64>,
        ownername_id: Option<i64>,
        url: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO erroneous_links (proaddress_id, ownername_id, url) VALUES (?1, ?2, ?3)",
            params![proaddress_id, ownername_id, url],
        )?;
        Ok(())
    }

    /// Quarantined links, newest first.
    pub fn list_erroneous(&self, limit: u32) -> Result<Vec<ErroneousLink>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM erroneous_links ORDER BY id DESC LIMIT ?")?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(ErroneousLink {
                    id: row.get("id")?,
                    proaddress_id: row.get("proaddress_id")?,
                    ownername_id: row.get("ownername_id")?,
                    url: row.get("url")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Check the skip list for an address signature. County-less skip rules
    /// apply to every county.
    pub fn is_skipped(
        &self,
        street_num: &str,
        street_name: &str,
        zip: &str,
        county: Option<&str>,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM property_skip
            WHERE street_num = ?1 AND street_name = ?2 AND zip = ?3
            AND (county IS NULL OR ?4 IS NULL OR county = ?4)
            AND skip = 1
            "#,
            params![street_num, street_name, zip, county],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Add an entry to the skip list.
    pub fn save_skip_rule(&self, rule: &SkipRule) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO property_skip (name, street_num, street_name, zip, county, skip, type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                rule.name,
                rule.street_num,
                rule.street_name,
                rule.zip,
                rule.county,
                rule.skip as i64,
                rule.kind,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Log a crawl-level error for operator triage.
    pub fn record_error(&self, site_id: i64, text: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO errors (site_id, date_time, text) VALUES (?1, ?2, ?3)",
            params![site_id, Utc::now().to_rfc3339(), text],
        )?;
        Ok(())
    }

    /// Crawl-level errors, newest first, optionally filtered by site.
    pub fn list_errors(&self, site_id: Option<i64>, limit: u32) -> Result<Vec<CrawlError>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM errors
            WHERE (?1 IS NULL OR site_id = ?1)
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![site_id, limit], |row| {
                Ok(CrawlError {
                    id: row.get("id")?,
                    site_id: row.get("site_id")?,
                    date_time: parse_datetime(&row.get::<_, String>("date_time")?),
                    text: row.get("text")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_property(row: &Row) -> rusqlite::Result<PropertyRecord> {
    let motive: Option<String> = row.get("PMotiveType")?;
    Ok(PropertyRecord {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        listing_id: row.get("listing_id")?,
        street_num: row.get("PStreetNum")?,
        street_name: row.get("PStreetName")?,
        backup_street_name: row.get("backup_street_name")?,
        city: row.get("Pcity")?,
        state: row.get("PState")?,
        zip: row.get("Pzip")?,
        beds: row.get("beds")?,
        baths: row.get("baths")?,
        sqft: row.get("sqft")?,
        price: row.get("price")?,
        motive_type: motive.as_deref().and_then(MotiveType::from_code),
    })
}

fn row_to_owner(row: &Row) -> rusqlite::Result<OwnerRecord> {
    let motive: Option<String> = row.get("PMotiveType")?;
    Ok(OwnerRecord {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        full_name: row.get("full_name")?,
        motive_type: motive.as_deref().and_then(MotiveType::from_code),
        hash: row.get("hash")?,
        page_id: row.get("page_id")?,
    })
}
