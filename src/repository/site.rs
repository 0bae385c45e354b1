//! Site registry: one row per target data source plus its crawl config.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{parse_datetime_opt, to_option, Result};
use crate::models::{from_yn, yn, CrawlerConfig, MotiveType, Site};

/// SQLite-backed site registry.
pub struct SiteRepository {
    db_path: PathBuf,
}

impl SiteRepository {
    /// Create a new site repository, initializing the schema.
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
            -- Target data sources (county/auctioneer sites)
            CREATE TABLE IF NOT EXISTS site (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER,
                url TEXT NOT NULL,
                module TEXT NOT NULL,
                owner_format TEXT,
                property_format TEXT,
                tables_to_use TEXT,
                last_run TEXT,
                priority INTEGER NOT NULL DEFAULT 100,
                crawler_name TEXT NOT NULL,

                UNIQUE(url, module)
            );

            -- Exactly one config row per site
            CREATE TABLE IF NOT EXISTS crawler_config (
                site_id INTEGER PRIMARY KEY REFERENCES site(id),
                proxy_yn TEXT NOT NULL DEFAULT 'N',
                time_delay_yn TEXT NOT NULL DEFAULT 'N',
                threads_yn TEXT NOT NULL DEFAULT 'N',
                rotate_proxies_yn TEXT NOT NULL DEFAULT 'N'
            );

            -- Distress-type lookup
            CREATE TABLE IF NOT EXISTS motive_types (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
        "#,
        )?;

        for motive in MotiveType::all() {
            conn.execute(
                "INSERT OR IGNORE INTO motive_types (code, name) VALUES (?1, ?2)",
                params![motive.code(), motive.name()],
            )?;
        }

        Ok(())
    }

    /// Register a site, or update its settings if (url, module) is known.
    /// Returns the site id.
    pub fn save(&self, site: &Site) -> Result<i64> {
        let conn = self.connect()?;

        conn.execute(
            r#"
            INSERT INTO site (
                group_id, url, module, owner_format, property_format,
                tables_to_use, last_run, priority, crawler_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(url, module) DO UPDATE SET
                group_id = excluded.group_id,
                owner_format = excluded.owner_format,
                property_format = excluded.property_format,
                tables_to_use = excluded.tables_to_use,
                priority = excluded.priority,
                crawler_name = excluded.crawler_name
            "#,
            params![
                site.group_id,
                site.url,
                site.module,
                site.owner_format,
                site.property_format,
                site.tables_to_use,
                site.last_run.map(|dt| dt.to_rfc3339()),
                site.priority,
                site.crawler_name,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM site WHERE url = ? AND module = ?",
            params![site.url, site.module],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Get a site by ID.
    pub fn get(&self, id: i64) -> Result<Option<Site>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM site WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_site))
    }

    /// All sites in scheduling order (priority ascending, then id).
    pub fn get_all(&self) -> Result<Vec<Site>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM site ORDER BY priority ASC, id ASC")?;
        let sites = stmt
            .query_map([], row_to_site)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    /// Delete a site and its config row.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM crawler_config WHERE site_id = ?", params![id])?;
        let rows = conn.execute("DELETE FROM site WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Update the last-run timestamp after a crawl finishes.
    pub fn update_last_run(&self, id: i64, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE site SET last_run = ? WHERE id = ?",
            params![timestamp.to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Save (insert or replace) the config row for a site.
    pub fn save_config(&self, config: &CrawlerConfig) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO crawler_config (
                site_id, proxy_yn, time_delay_yn, threads_yn, rotate_proxies_yn
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(site_id) DO UPDATE SET
                proxy_yn = excluded.proxy_yn,
                time_delay_yn = excluded.time_delay_yn,
                threads_yn = excluded.threads_yn,
                rotate_proxies_yn = excluded.rotate_proxies_yn
            "#,
            params![
                config.site_id,
                yn(config.proxy),
                yn(config.time_delay),
                yn(config.threads),
                yn(config.rotate_proxies),
            ],
        )?;
        Ok(())
    }

    /// Get the config for a site, defaulting all flags off when absent.
    pub fn get_config(&self, site_id: i64) -> Result<CrawlerConfig> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM crawler_config WHERE site_id = ?")?;

        let config = to_option(stmt.query_row(params![site_id], |row| {
            Ok(CrawlerConfig {
                site_id: row.get("site_id")?,
                proxy: from_yn(&row.get::<_, String>("proxy_yn")?),
                time_delay: from_yn(&row.get::<_, String>("time_delay_yn")?),
                threads: from_yn(&row.get::<_, String>("threads_yn")?),
                rotate_proxies: from_yn(&row.get::<_, String>("rotate_proxies_yn")?),
            })
        }))?;

        Ok(config.unwrap_or_else(|| CrawlerConfig::for_site(site_id)))
    }
}

fn row_to_site(row: &Row) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        url: row.get("url")?,
        module: row.get("module")?,
        owner_format: row.get("owner_format")?,
        property_format: row.get("property_format")?,
        tables_to_use: row.get("tables_to_use")?,
        last_run: parse_datetime_opt(row.get::<_, Option<String>>("last_run")?),
        priority: row.get("priority")?,
        crawler_name: row.get("crawler_name")?,
    })
}
