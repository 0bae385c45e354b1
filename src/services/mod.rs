//! Domain services: record linkage and ingest orchestration.

mod ingest;
mod linkage;

pub use ingest::{IngestService, RunSummary};
pub use linkage::{LinkageEngine, DEFAULT_MATCH_THRESHOLD};
