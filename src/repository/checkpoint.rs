//! Restart/checkpoint log: resume an interrupted crawl from the last
//! completed geography unit.
//!
//! `restart_row` is strictly append-only; the current checkpoint for a site
//! is the highest-id row. `crawled_counties` records coarser whole-county
//! completions used for freshness decisions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{parse_datetime, to_option, Result};
use crate::models::{Checkpoint, CountyCrawl};

/// SQLite-backed checkpoint log.
pub struct CheckpointRepository {
    db_path: PathBuf,
}

impl CheckpointRepository {
    /// Create a new checkpoint repository, initializing the schema.
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
            -- Append-only crawl checkpoints; latest id wins per site
            CREATE TABLE IF NOT EXISTS restart_row (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                county TEXT NOT NULL,
                city TEXT NOT NULL,
                zipcode TEXT NOT NULL,
                data_url TEXT NOT NULL
            );

            -- Append-only county completion log
            CREATE TABLE IF NOT EXISTS crawled_counties (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                date_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_restart_row_site
                ON restart_row(site_id, id);
            CREATE INDEX IF NOT EXISTS idx_crawled_counties_site
                ON crawled_counties(site_id, date_time);
        "#,
        )?;
        Ok(())
    }

    /// Append a checkpoint for the last successfully completed
    /// (county, city, zipcode, url). Prior rows are never touched.
    pub fn record_checkpoint(
        &self,
        site_id: i64,
        county: &str,
        city: &str,
        zipcode: &str,
        data_url: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO restart_row (site_id, county, city, zipcode, data_url)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![site_id, county, city, zipcode, data_url],
        )?;
        Ok(())
    }

    /// The current checkpoint for a site, or None if the site has never
    /// been checkpointed (crawl starts from the beginning).
    pub fn last_checkpoint(&self, site_id: i64) -> Result<Option<Checkpoint>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM restart_row
            WHERE site_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )?;
        to_option(stmt.query_row(params![site_id], row_to_checkpoint))
    }

    /// Full checkpoint history for a site, newest first.
    pub fn history(&self, site_id: i64, limit: u32) -> Result<Vec<Checkpoint>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM restart_row
            WHERE site_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt
            .query_map(params![site_id, limit], row_to_checkpoint)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record that a full county crawl completed for a site.
    pub fn mark_county_complete(&self, site_id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO crawled_counties (site_id, date_time) VALUES (?1, ?2)",
            params![site_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// When the most recent full county crawl finished, for staleness
    /// decisions.
    pub fn last_county_crawl(&self, site_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.connect()?;
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(date_time) FROM crawled_counties WHERE site_id = ?",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(latest.map(|s| parse_datetime(&s)))
    }

    /// County completion log for a site, newest first.
    pub fn county_crawls(&self, site_id: i64, limit: u32) -> Result<Vec<CountyCrawl>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM crawled_counties
            WHERE site_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt
            .query_map(params![site_id, limit], |row| {
                Ok(CountyCrawl {
                    id: row.get("id")?,
                    site_id: row.get("site_id")?,
                    date_time: parse_datetime(&row.get::<_, String>("date_time")?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_checkpoint(row: &Row) -> rusqlite::Result<Checkpoint> {
    Ok(Checkpoint {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        county: row.get("county")?,
        city: row.get("city")?,
        zipcode: row.get("zipcode")?,
        data_url: row.get("data_url")?,
    })
}
