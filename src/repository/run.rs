//! Crawl run ledger: lifecycle of each crawl invocation plus its progress
//! cursor.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use super::{parse_datetime, parse_datetime_opt, to_option, Result};
use crate::models::{ConfigSnapshot, CrawlerRun, HistoryCursor, RunStatus};

/// SQLite-backed crawl run ledger.
pub struct RunRepository {
    db_path: PathBuf,
}

impl RunRepository {
    /// Create a new run repository, initializing the schema.
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
            -- One row per crawl attempt; mutated in place, never deleted
            CREATE TABLE IF NOT EXISTS crawler_run (
                CrawlerId INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                Stage INTEGER NOT NULL DEFAULT 0,
                CrawlerFile TEXT NOT NULL,
                CrDataType TEXT NOT NULL,
                LastRunStart TEXT NOT NULL,
                LastRunEnd TEXT,
                RunStatus TEXT NOT NULL DEFAULT 'running',
                Proxy TEXT NOT NULL DEFAULT 'N',
                RotateProxy TEXT NOT NULL DEFAULT 'N',
                TimeDelay TEXT NOT NULL DEFAULT 'N',
                Enable TEXT NOT NULL DEFAULT 'Y',
                RunDetails TEXT NOT NULL DEFAULT ''
            );

            -- At most one progress cursor per run
            CREATE TABLE IF NOT EXISTS history (
                crawler_id INTEGER PRIMARY KEY REFERENCES crawler_run(CrawlerId),
                page INTEGER NOT NULL DEFAULT 0,
                ad_number INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_crawler_run_site
                ON crawler_run(site_id, LastRunStart);
        "#,
        )?;
        Ok(())
    }

    /// Record the start of a crawl. Returns the new crawler id.
    pub fn start_run(
        &self,
        site_id: i64,
        crawler_file: &str,
        data_type: &str,
        config: &ConfigSnapshot,
    ) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO crawler_run (
                site_id, Stage, CrawlerFile, CrDataType, LastRunStart,
                RunStatus, Proxy, RotateProxy, TimeDelay, Enable, RunDetails
            ) VALUES (?1, 0, ?2, ?3, ?4, 'running', ?5, ?6, ?7, ?8, '')
            "#,
            params![
                site_id,
                crawler_file,
                data_type,
                Utc::now().to_rfc3339(),
                config.proxy,
                config.rotate_proxy,
                config.time_delay,
                config.enable,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Advance a run to a later stage, appending to its details log.
    ///
    /// Unknown ids, terminal runs, and stage regressions are logged no-ops;
    /// the ledger only ever moves forward.
    pub fn advance_stage(&self, crawler_id: i64, stage: i64, details: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| {
            let current: Option<(i64, String)> = to_option(conn.query_row(
                "SELECT Stage, RunStatus FROM crawler_run WHERE CrawlerId = ?",
                params![crawler_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ))?;

            let (current_stage, status) = match current {
                Some(row) => row,
                None => {
                    tracing::warn!(crawler_id, "advance_stage on unknown run ignored");
                    return Ok(());
                }
            };

            if RunStatus::from_str(&status).map_or(true, |s| s.is_terminal()) {
                tracing::warn!(crawler_id, status, "advance_stage on terminal run ignored");
                return Ok(());
            }
            if stage < current_stage {
                tracing::warn!(
                    crawler_id,
                    current_stage,
                    requested = stage,
                    "stage regression ignored"
                );
                return Ok(());
            }

            conn.execute(
                r#"
                UPDATE crawler_run
                SET Stage = ?1,
                    RunDetails = RunDetails || ?2
                WHERE CrawlerId = ?3
                "#,
                params![stage, format!("[stage {}] {}\n", stage, details), crawler_id],
            )?;
            Ok(())
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }
        result
    }

    /// Close out a run with a terminal status.
    ///
    /// There is no transition back to running; a retried crawl starts a new
    /// run with a fresh crawler id.
    pub fn complete_run(&self, crawler_id: i64, status: RunStatus) -> Result<()> {
        debug_assert!(status.is_terminal());
        let conn = self.connect()?;
        let rows = conn.execute(
            r#"
            UPDATE crawler_run
            SET RunStatus = ?1, LastRunEnd = ?2
            WHERE CrawlerId = ?3 AND RunStatus = 'running'
            "#,
            params![status.as_str(), Utc::now().to_rfc3339(), crawler_id],
        )?;
        if rows == 0 {
            tracing::warn!(crawler_id, "complete_run on unknown or terminal run ignored");
        }
        Ok(())
    }

    /// Upsert the single progress cursor for a run (overwritten, not
    /// appended). Ignored for unknown or terminal runs.
    pub fn advance_cursor(&self, crawler_id: i64, page: i64, ad_number: i64) -> Result<()> {
        let conn = self.connect()?;

        let running: i64 = conn.query_row(
            "SELECT COUNT(*) FROM crawler_run WHERE CrawlerId = ? AND RunStatus = 'running'",
            params![crawler_id],
            |row| row.get(0),
        )?;
        if running == 0 {
            tracing::warn!(crawler_id, "advance_cursor on unknown or terminal run ignored");
            return Ok(());
        }

        conn.execute(
            r#"
            INSERT INTO history (crawler_id, page, ad_number)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(crawler_id) DO UPDATE SET
                page = excluded.page,
                ad_number = excluded.ad_number
            "#,
            params![crawler_id, page, ad_number],
        )?;
        Ok(())
    }

    /// Get the progress cursor for a run, if one has been written.
    pub fn get_cursor(&self, crawler_id: i64) -> Result<Option<HistoryCursor>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM history WHERE crawler_id = ?")?;
        to_option(stmt.query_row(params![crawler_id], |row| {
            Ok(HistoryCursor {
                crawler_id: row.get("crawler_id")?,
                page: row.get("page")?,
                ad_number: row.get("ad_number")?,
            })
        }))
    }

    /// Get a run by id.
    pub fn get(&self, crawler_id: i64) -> Result<Option<CrawlerRun>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM crawler_run WHERE CrawlerId = ?")?;
        to_option(stmt.query_row(params![crawler_id], row_to_run))
    }

    /// Recent runs, newest first, optionally filtered by site.
    pub fn list(&self, site_id: Option<i64>, limit: u32) -> Result<Vec<CrawlerRun>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM crawler_run
            WHERE (?1 IS NULL OR site_id = ?1)
            ORDER BY LastRunStart DESC, CrawlerId DESC
            LIMIT ?2
            "#,
        )?;
        let runs = stmt
            .query_map(params![site_id, limit], row_to_run)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

fn row_to_run(row: &Row) -> rusqlite::Result<CrawlerRun> {
    let status: String = row.get("RunStatus")?;
    Ok(CrawlerRun {
        crawler_id: row.get("CrawlerId")?,
        site_id: row.get("site_id")?,
        stage: row.get("Stage")?,
        crawler_file: row.get("CrawlerFile")?,
        data_type: row.get("CrDataType")?,
        last_run_start: parse_datetime(&row.get::<_, String>("LastRunStart")?),
        last_run_end: parse_datetime_opt(row.get::<_, Option<String>>("LastRunEnd")?),
        run_status: RunStatus::from_str(&status).unwrap_or(RunStatus::Failed),
        config: ConfigSnapshot {
            proxy: row.get("Proxy")?,
            rotate_proxy: row.get("RotateProxy")?,
            time_delay: row.get("TimeDelay")?,
            enable: row.get("Enable")?,
        },
        run_details: row.get("RunDetails")?,
    })
}
