//! Configuration management.
//!
//! Settings come from `leadacquire.toml` in the data directory when present,
//! with environment overrides (`LEADACQUIRE_DATA_DIR`, `LEADACQUIRE_DB`).
//! A `.env` file is honored via dotenvy before settings are read.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::repository::{
    CaptureRepository, CheckpointRepository, LinkageRepository, Result as RepoResult,
    RunRepository, SiteRepository,
};
use crate::services::{IngestService, LinkageEngine};

/// Default checkpoint cadence: one restart_row per this many captures.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 25;

/// Optional settings file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileSettings {
    database: Option<PathBuf>,
    checkpoint_interval: Option<u64>,
    match_threshold: Option<f64>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub checkpoint_interval: u64,
    pub match_threshold: f64,
}

impl Settings {
    /// Resolve settings from the data directory, config file, and
    /// environment.
    pub fn load(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir
            .or_else(|| std::env::var_os("LEADACQUIRE_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data"));

        let file: FileSettings = {
            let path = data_dir.join("leadacquire.toml");
            if path.exists() {
                toml::from_str(&fs::read_to_string(&path)?)?
            } else {
                FileSettings::default()
            }
        };

        let db_path = std::env::var_os("LEADACQUIRE_DB")
            .map(PathBuf::from)
            .or(file.database)
            .unwrap_or_else(|| data_dir.join("leadacquire.db"));

        Ok(Self {
            data_dir,
            db_path,
            checkpoint_interval: file
                .checkpoint_interval
                .unwrap_or(DEFAULT_CHECKPOINT_INTERVAL),
            match_threshold: file
                .match_threshold
                .unwrap_or(crate::services::DEFAULT_MATCH_THRESHOLD),
        })
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Open every repository against the configured database.
    pub fn open_repositories(&self) -> RepoResult<Repositories> {
        Repositories::open(self)
    }
}

/// Bundle of all repositories over one database file.
#[derive(Clone)]
pub struct Repositories {
    pub sites: Arc<SiteRepository>,
    pub runs: Arc<RunRepository>,
    pub captures: Arc<CaptureRepository>,
    pub checkpoints: Arc<CheckpointRepository>,
    pub linkage: Arc<LinkageRepository>,
}

impl Repositories {
    fn open(settings: &Settings) -> RepoResult<Self> {
        // Site schema first: it owns the motive_types lookup the capture and
        // linkage tables reference.
        let sites = Arc::new(SiteRepository::new(&settings.db_path)?);
        Ok(Self {
            sites,
            runs: Arc::new(RunRepository::new(&settings.db_path)?),
            captures: Arc::new(CaptureRepository::new(&settings.db_path)?),
            checkpoints: Arc::new(CheckpointRepository::new(&settings.db_path)?),
            linkage: Arc::new(LinkageRepository::new(&settings.db_path)?),
        })
    }

    /// Build a linkage engine over these repositories.
    pub fn engine(&self, match_threshold: f64) -> LinkageEngine {
        LinkageEngine::new(Arc::clone(&self.linkage), Arc::clone(&self.captures))
            .with_threshold(match_threshold)
    }

    /// Build an ingest service over these repositories.
    pub fn ingest(&self, settings: &Settings) -> IngestService {
        IngestService::new(
            Arc::clone(&self.sites),
            Arc::clone(&self.runs),
            Arc::clone(&self.captures),
            Arc::clone(&self.checkpoints),
            Arc::clone(&self.linkage),
            self.engine(settings.match_threshold),
            settings.checkpoint_interval,
        )
    }
}
