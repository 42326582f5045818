//! shopscrape: product page extraction pipeline.
//!
//! This library provides:
//! - A `Page` capability with browser (Playwright) and static HTML backends
//! - Field extractors and the coordinated-item walker
//! - Sequential or pooled run orchestration
//! - Append-only JSON and spreadsheet sinks

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod models;
pub mod scraper;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::core::{Orchestrator, RunReport};
pub use crate::error::{ScrapeError, ScrapeResult};
pub use crate::models::ProductRecord;
