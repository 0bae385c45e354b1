//! Shared utilities.

pub mod address;
