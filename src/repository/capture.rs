//! Raw page and file stores with idempotent capture semantics.
//!
//! Captures are deduplicated at insert time through unique constraints:
//! pages on (site_id, url), files on (site_id, html_md5). Re-capturing
//! returns the existing row rather than writing a duplicate.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Row};

use super::{parse_datetime, to_option, Result};
use crate::models::{FileCapture, MotiveType, PageCapture, ParseState};

/// Per-site capture counts for the admin surface.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CaptureStats {
    pub pages_total: u64,
    pub pages_unparsed: u64,
    pub files_total: u64,
    pub files_unparsed: u64,
}

/// SQLite-backed store for raw page and file captures.
pub struct CaptureRepository {
    db_path: PathBuf,
}

impl CaptureRepository {
    /// Create a new capture repository, initializing the schema.
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
            -- Raw HTML/text captures, one per page
            CREATE TABLE IF NOT EXISTS pages_urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                content TEXT NOT NULL,
                parsed INTEGER NOT NULL DEFAULT 0,

                -- Denormalized extraction fields pending normalization
                address TEXT,
                owner TEXT,
                auctioneer TEXT,
                auction TEXT,
                listing_id TEXT,
                motive_type TEXT REFERENCES motive_types(code),

                parser_status TEXT,
                crawler_status TEXT,
                captured_at TEXT NOT NULL,

                UNIQUE(site_id, url)
            );

            -- Document captures (PDF/file-based sources)
            CREATE TABLE IF NOT EXISTS files_urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                county_id INTEGER,
                url TEXT NOT NULL,
                contents TEXT NOT NULL,
                html_md5 TEXT NOT NULL,
                parsed INTEGER NOT NULL DEFAULT 0,
                proaddress_id INTEGER,
                ownername_id INTEGER,
                motive_type TEXT REFERENCES motive_types(code),
                captured_at TEXT NOT NULL,

                UNIQUE(site_id, html_md5)
            );

            CREATE INDEX IF NOT EXISTS idx_pages_urls_site_parsed
                ON pages_urls(site_id, parsed);
            CREATE INDEX IF NOT EXISTS idx_files_urls_site_parsed
                ON files_urls(site_id, parsed);
        "#,
        )?;
        Ok(())
    }

    /// Persist a page capture if (site_id, url) is new; otherwise return the
    /// existing row untouched. Idempotent by construction.
    pub fn capture_page(&self, site_id: i64, url: &str, content: &str) -> Result<PageCapture> {
        let conn = self.connect()?;

        conn.execute(
            r#"
            INSERT INTO pages_urls (site_id, url, content, parsed, captured_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ON CONFLICT(site_id, url) DO NOTHING
            "#,
            params![site_id, url, content, chrono::Utc::now().to_rfc3339()],
        )?;

        let mut stmt = conn.prepare("SELECT * FROM pages_urls WHERE site_id = ? AND url = ?")?;
        let capture = stmt.query_row(params![site_id, url], row_to_page)?;
        Ok(capture)
    }

    /// Persist a file capture, deduplicating byte-identical content by MD5.
    /// Two URLs serving identical bytes yield one row.
    pub fn capture_file(
        &self,
        site_id: i64,
        county_id: Option<i64>,
        url: &str,
        contents: &str,
    ) -> Result<FileCapture> {
        let conn = self.connect()?;
        let html_md5 = FileCapture::compute_md5(contents);

        conn.execute(
            r#"
            INSERT INTO files_urls (site_id, county_id, url, contents, html_md5, parsed, captured_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            ON CONFLICT(site_id, html_md5) DO NOTHING
            "#,
            params![
                site_id,
                county_id,
                url,
                contents,
                html_md5,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        let mut stmt =
            conn.prepare("SELECT * FROM files_urls WHERE site_id = ? AND html_md5 = ?")?;
        let capture = stmt.query_row(params![site_id, html_md5], row_to_file)?;
        Ok(capture)
    }

    /// Get a page capture by id.
    pub fn get_page(&self, id: i64) -> Result<Option<PageCapture>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM pages_urls WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_page))
    }

    /// Get a file capture by id.
    pub fn get_file(&self, id: i64) -> Result<Option<FileCapture>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM files_urls WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_file))
    }

    /// Unparsed page captures for a site, oldest first.
    pub fn unparsed_pages(&self, site_id: i64, limit: u32) -> Result<Vec<PageCapture>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM pages_urls
            WHERE site_id = ? AND parsed = 0
            ORDER BY id ASC
            LIMIT ?
            "#,
        )?;
        let pages = stmt
            .query_map(params![site_id, limit], row_to_page)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Unparsed file captures for a site, oldest first.
    pub fn unparsed_files(&self, site_id: i64, limit: u32) -> Result<Vec<FileCapture>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM files_urls
            WHERE site_id = ? AND parsed = 0
            ORDER BY id ASC
            LIMIT ?
            "#,
        )?;
        let files = stmt
            .query_map(params![site_id, limit], row_to_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Transition a page capture Unparsed -> Parsed. The only legal parse
    /// transition; already-parsed rows are left alone.
    pub fn mark_page_parsed(&self, id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE pages_urls SET parsed = 1 WHERE id = ? AND parsed = 0",
            params![id],
        )?;
        Ok(())
    }

    /// Transition a file capture Unparsed -> Parsed.
    pub fn mark_file_parsed(&self, id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE files_urls SET parsed = 1 WHERE id = ? AND parsed = 0",
            params![id],
        )?;
        Ok(())
    }

    /// Fill in the denormalized extraction fields on a page capture ahead of
    /// linkage. Content itself is never rewritten.
    #[allow(clippy::too_many_arguments)]
    pub fn set_page_extraction(
        &self,
        id: i64,
        address: Option<&str>,
        owner: Option<&str>,
        auctioneer: Option<&str>,
        auction: Option<&str>,
        listing_id: Option<&str>,
        motive_type: Option<MotiveType>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE pages_urls SET
                address = ?1,
                owner = ?2,
                auctioneer = ?3,
                auction = ?4,
                listing_id = ?5,
                motive_type = ?6
            WHERE id = ?7
            "#,
            params![
                address,
                owner,
                auctioneer,
                auction,
                listing_id,
                motive_type.map(|m| m.code()),
                id
            ],
        )?;
        Ok(())
    }

    /// Record a parser/crawler status annotation on a page capture.
    pub fn set_page_status(
        &self,
        id: i64,
        parser_status: Option<&str>,
        crawler_status: Option<&str>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE pages_urls SET parser_status = ?1, crawler_status = ?2 WHERE id = ?3",
            params![parser_status, crawler_status, id],
        )?;
        Ok(())
    }

    /// Point a file capture at its resolved property/owner rows.
    pub fn link_file(
        &self,
        id: i64,
        proaddress_id: Option<i64>,
        ownername_id: Option<i64>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE files_urls SET proaddress_id = ?1, ownername_id = ?2 WHERE id = ?3",
            params![proaddress_id, ownername_id, id],
        )?;
        Ok(())
    }

    /// Capture counts for a site.
    pub fn stats(&self, site_id: i64) -> Result<CaptureStats> {
        let conn = self.connect()?;
        let (pages_total, pages_unparsed): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*), SUM(CASE WHEN parsed = 0 THEN 1 ELSE 0 END)
            FROM pages_urls WHERE site_id = ?
            "#,
            params![site_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                ))
            },
        )?;
        let (files_total, files_unparsed): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*), SUM(CASE WHEN parsed = 0 THEN 1 ELSE 0 END)
            FROM files_urls WHERE site_id = ?
            "#,
            params![site_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                ))
            },
        )?;
        Ok(CaptureStats {
            pages_total: pages_total as u64,
            pages_unparsed: pages_unparsed as u64,
            files_total: files_total as u64,
            files_unparsed: files_unparsed as u64,
        })
    }
}

fn parse_state(row: &Row) -> rusqlite::Result<ParseState> {
    let flag: i64 = row.get("parsed")?;
    Ok(ParseState::from_flag(flag).unwrap_or(ParseState::Unparsed))
}

fn motive(row: &Row) -> rusqlite::Result<Option<MotiveType>> {
    let code: Option<String> = row.get("motive_type")?;
    Ok(code.as_deref().and_then(MotiveType::from_code))
}

fn row_to_page(row: &Row) -> rusqlite::Result<PageCapture> {
    Ok(PageCapture {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        url: row.get("url")?,
        content: row.get("content")?,
        parsed: parse_state(row)?,
        address: row.get("address")?,
        owner: row.get("owner")?,
        auctioneer: row.get("auctioneer")?,
        auction: row.get("auction")?,
        listing_id: row.get("listing_id")?,
        motive_type: motive(row)?,
        parser_status: row.get("parser_status")?,
        crawler_status: row.get("crawler_status")?,
        captured_at: parse_datetime(&row.get::<_, String>("captured_at")?),
    })
}

fn row_to_file(row: &Row) -> rusqlite::Result<FileCapture> {
    Ok(FileCapture {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        county_id: row.get("county_id")?,
        url: row.get("url")?,
        contents: row.get("contents")?,
        html_md5: row.get("html_md5")?,
        parsed: parse_state(row)?,
        proaddress_id: row.get("proaddress_id")?,
        ownername_id: row.get("ownername_id")?,
        motive_type: motive(row)?,
        captured_at: parse_datetime(&row.get::<_, String>("captured_at")?),
    })
}
