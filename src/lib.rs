//! leadacquire - distressed-property lead acquisition and record linkage.
//!
//! Tracks target county/auctioneer sites, the lifecycle of each crawl run,
//! raw page/file captures, restart checkpoints, and the record linkage that
//! resolves captures into normalized property and owner entities.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;
pub mod utils;
