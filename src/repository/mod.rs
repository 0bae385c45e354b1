//! Repository layer for SQLite persistence.
//!
//! Each ledger gets its own repository struct holding the database path and
//! opening a connection per call. Schemas are created idempotently at
//! construction time. Table and column names match the legacy schema so the
//! data stays readable by existing tooling.

mod capture;
mod checkpoint;
mod linkage;
mod run;
mod site;

pub use capture::{CaptureRepository, CaptureStats};
pub use checkpoint::CheckpointRepository;
pub use linkage::LinkageRepository;
pub use run::RunRepository;
pub use site::SiteRepository;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// Errors from the repository layer.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field} value in row: {value}")]
    InvalidColumn { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection with the pragmas every repository relies on.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Map a no-rows query result to `None` instead of an error.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
