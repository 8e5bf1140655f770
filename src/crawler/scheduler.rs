//! Crawl orchestration
//!
//! The [`Crawler`] owns the discovered-link set, wraps the page task in a
//! retry-aware outcome type, drives the bounded pool and aggregates terminal
//! failures into the error store. A crawl ends when the pool drains.

use crate::classify::{CrawlError, ErrorKind, EMPTY_MESSAGE};
use crate::browser::PageProvider;
use crate::config::{self, CrawlerOptions};
use crate::crawler::{page_task, CrawlContext, CrawlTask};
use crate::pool::{PoolConfig, PoolError, PoolHandle, TaskPool};
use crate::report::ErrorStore;
use crate::url::normalize_url;
use crate::WardenError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Parent recorded for the seed task
pub const SEED_PARENT: &str = "(none)";

/// Outcome of one page attempt that did not pass
///
/// `Errors` carries classified page errors and is eligible for retry as a
/// known failure; `Crash` marks a defect in the crawler's own plumbing and
/// surfaces through the same reporting path as a page crash.
#[derive(Debug)]
pub enum PageFailure {
    Errors(Vec<CrawlError>),
    Crash(String),
}

/// Result of a finished crawl run
#[derive(Debug)]
pub struct RunResult {
    /// Terminal errors grouped by page URL
    pub store: ErrorStore,

    /// Pages processed, including retried and failed ones
    pub pages_crawled: usize,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// The crawl engine
pub struct Crawler {
    options: CrawlerOptions,
    provider: Arc<dyn PageProvider>,
}

impl Crawler {
    /// Validates the options and prepares a crawler
    pub fn new(
        options: CrawlerOptions,
        provider: Arc<dyn PageProvider>,
    ) -> Result<Self, WardenError> {
        config::validate(&options)?;
        Ok(Self { options, provider })
    }

    /// Crawls from the seed URL until every reachable in-scope page has been
    /// rendered, then shuts the provider down
    pub async fn run(&self) -> Result<RunResult, WardenError> {
        let start = Instant::now();
        let base = Url::parse(&self.options.url)?;
        let seed = normalize_url(&base);

        tracing::info!(
            "starting crawl of {} (depth: {}, concurrency: {})",
            seed,
            self.options
                .depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
            self.options.concurrency
        );

        let ctx = Arc::new(CrawlContext {
            provider: self.provider.clone(),
            base,
            exclusions: self.options.exclusions.clone(),
            discovered: Mutex::new(HashSet::from([seed.clone()])),
        });

        let store = Arc::new(Mutex::new(ErrorStore::new()));

        let pool_config = PoolConfig {
            concurrency: self.options.concurrency,
            task_timeout: Duration::from_millis(self.options.timeout_ms),
            retries: self.options.retries,
            retry_delay: Duration::from_millis(self.options.retry_delay_ms),
            silent: self.options.silent,
        };

        let task_ctx = ctx.clone();
        let failure_store = store.clone();

        let pool = TaskPool::new(
            pool_config,
            move |task: CrawlTask, handle: PoolHandle<CrawlTask>| {
                let ctx = task_ctx.clone();
                async move {
                    match page_task::run(&ctx, &task, &handle).await {
                        Ok(errors) if errors.is_empty() => Ok(()),
                        Ok(errors) => Err(PageFailure::Errors(errors)),
                        Err(e) => Err(PageFailure::Crash(e.to_string())),
                    }
                }
            },
            // Retried attempts are discarded wholesale; reprocessing is
            // idempotent because the discovered set already holds the
            // page's links.
            |task: &CrawlTask, _failure: &PoolError<PageFailure>, attempt: u32| {
                tracing::warn!("retrying {} (attempt {})", display_path(&task.url), attempt + 1);
            },
            move |task: CrawlTask, failure: PoolError<PageFailure>| {
                let errors = match failure {
                    PoolError::Task(PageFailure::Errors(errors)) => errors,
                    PoolError::Task(PageFailure::Crash(message)) => {
                        vec![crash_error(&task.url, &message)]
                    }
                    PoolError::TimedOut { limit } => {
                        vec![crash_error(
                            &task.url,
                            &format!("timed out after {}ms", limit.as_millis()),
                        )]
                    }
                };
                tracing::error!("{}: {} error(s) after retries", task.url, errors.len());
                failure_store
                    .lock()
                    .expect("error-store lock poisoned")
                    .record(&task.url, errors);
            },
        );

        pool.submit(CrawlTask {
            url: seed,
            parent_url: SEED_PARENT.to_string(),
            remaining_depth: self.options.depth,
        });
        pool.wait_idle().await;
        let pages_crawled = pool.completed();
        pool.close().await;

        self.provider.shutdown().await?;

        let store = Arc::try_unwrap(store)
            .map(|m| m.into_inner().expect("error-store lock poisoned"))
            .unwrap_or_else(|arc| {
                std::mem::take(&mut *arc.lock().expect("error-store lock poisoned"))
            });

        tracing::info!(
            "crawl finished: {} page(s) in {:.1}s, {} with errors",
            pages_crawled,
            start.elapsed().as_secs_f64(),
            store.len()
        );

        Ok(RunResult {
            store,
            pages_crawled,
            elapsed: start.elapsed(),
        })
    }
}

/// Path component of a URL for human-readable notices
fn display_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Synthesizes the error recorded for a defect or timeout
fn crash_error(page_url: &str, message: &str) -> CrawlError {
    let message = if message.is_empty() {
        EMPTY_MESSAGE
    } else {
        message
    };
    CrawlError::new(
        page_url,
        ErrorKind::PageCrash,
        format!("Error crawling {}: {}", display_path(page_url), message),
    )
}
