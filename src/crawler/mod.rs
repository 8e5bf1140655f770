//! Crawler module for rendered-page auditing
//!
//! This module contains the core crawling logic:
//! - Per-page processing with error collection
//! - Link extraction from rendered content
//! - Retry-aware scheduling over the bounded pool
//! - Aggregation of terminal failures

mod page_task;
mod parser;
mod scheduler;

pub use parser::{extract_links, ignore_meta_value};
pub use scheduler::{Crawler, PageFailure, RunResult, SEED_PARENT};

use crate::browser::PageProvider;
use crate::config::CrawlerOptions;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use url::Url;

/// One unit of crawl work
///
/// Created once (for the seed, or when a page discovers a new link) and
/// consumed exactly once by the pool. `remaining_depth` of `Some(0)` means
/// the page is visited but contributes no further tasks; `None` means no
/// depth limit.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// Normalized URL to render
    pub url: String,

    /// URL of the page this one was discovered on
    pub parent_url: String,

    /// Link-expansion hops left from this page
    pub remaining_depth: Option<u32>,
}

/// State shared by every page task of one run
pub struct CrawlContext {
    /// Rendering sessions come from here, one per task
    pub provider: Arc<dyn PageProvider>,

    /// Origin that defines the crawl scope
    pub base: Url,

    /// Substring patterns for URLs that are never enqueued
    pub exclusions: Vec<String>,

    /// Every normalized URL ever enqueued, the seed included
    pub discovered: Mutex<HashSet<String>>,
}

/// Runs a complete crawl with the given options and page provider
///
/// This is the main library entry point. It validates the options, drives
/// the crawl to completion and returns the accumulated result; rendering
/// the report and choosing the exit code are left to the caller.
pub async fn crawl(
    options: CrawlerOptions,
    provider: Arc<dyn PageProvider>,
) -> crate::Result<RunResult> {
    Crawler::new(options, provider)?.run().await
}
