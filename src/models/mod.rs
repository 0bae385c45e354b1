//! Data models for leadacquire.

mod capture;
mod linkage;
mod motive;
mod run;
mod site;

pub use capture::{FileCapture, PageCapture, ParseState};
pub use linkage::{ErroneousLink, LinkageOutcome, OwnerRecord, PropertyRecord, SkipRule};
pub use motive::MotiveType;
pub use run::{Checkpoint, CountyCrawl, CrawlError, CrawlerRun, HistoryCursor, RunStatus};
pub use site::{ConfigSnapshot, CrawlerConfig, Site};

pub(crate) use site::{from_yn, yn};
