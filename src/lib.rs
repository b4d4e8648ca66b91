//! Repricer: marketplace price reconciliation service.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sheets;
pub mod scraper;
pub mod pricing;
pub mod snapshot;
pub mod engine;
