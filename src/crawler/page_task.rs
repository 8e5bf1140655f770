//! Processing of one crawl task
//!
//! A page task renders a single URL, collects classified errors, expands
//! in-scope links back into the pool, applies the page's declared ignore
//! rules and returns the surviving errors. Both the rendering session and
//! the event subscription are released on every exit path.

use crate::browser::{BrowserError, PageHandle, WaitMode};
use crate::classify::{CrawlError, ErrorCollector};
use crate::crawler::{parser, CrawlContext, CrawlTask};
use crate::ignore;
use crate::pool::PoolHandle;
use crate::url::{is_in_scope, normalize_url};
use url::Url;

/// RAII guard for a rendering session
///
/// The preferred path is the explicit async [`PageGuard::close`]; the Drop
/// fallback spawns a best-effort close so error paths cannot leak tabs.
struct PageGuard {
    page: Option<Box<dyn PageHandle>>,
    url: String,
    runtime: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Box<dyn PageHandle>, url: &str) -> Self {
        Self {
            page: Some(page),
            url: url.to_string(),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn page(&self) -> &dyn PageHandle {
        self.page.as_deref().expect("page already closed")
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!("failed to close page for {}: {}", self.url, e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!("page cleanup failed for {}: {}", url, e);
                }
            });
        }
    }
}

/// Picks the navigation wait condition for a page
///
/// Reference material is large and static; waiting for its scripts to settle
/// costs time without catching anything the load event does not. Interactive
/// pages get the stricter network-idle wait.
pub fn wait_mode_for(path: &str) -> WaitMode {
    if path.split('/').any(|segment| segment == "api") || path.starts_with("/reference/") {
        WaitMode::Load
    } else {
        WaitMode::NetworkIdle
    }
}

/// Renders one URL and returns its non-ignored errors
///
/// An empty result means the page passed. Unexpected plumbing failures
/// propagate as errors for the scheduler's wrapper to classify.
pub async fn run(
    ctx: &CrawlContext,
    task: &CrawlTask,
    handle: &PoolHandle<CrawlTask>,
) -> Result<Vec<CrawlError>, BrowserError> {
    tracing::debug!("processing {} (found on {})", task.url, task.parent_url);

    let guard = PageGuard::new(ctx.provider.open_page().await?, &task.url);
    let subscription = guard.page().subscribe().await?;
    let mut collector = ErrorCollector::new(&task.url, subscription);

    let page_url = Url::parse(&task.url).ok();
    let wait = page_url
        .as_ref()
        .map(|u| wait_mode_for(u.path()))
        .unwrap_or(WaitMode::NetworkIdle);

    let mut navigated = true;
    if let Err(e) = guard.page().navigate(&task.url, wait).await {
        match e {
            BrowserError::Navigation { reason, .. } => {
                collector.record_navigation_failure(&reason);
                navigated = false;
            }
            other => return Err(other),
        }
    }

    // The rendered DOM backs both link expansion and the ignore rules; a
    // page that never navigated has neither.
    let html = if navigated {
        Some(guard.page().content().await?)
    } else {
        None
    };

    if task.remaining_depth != Some(0) {
        if let (Some(html), Some(base)) = (&html, &page_url) {
            expand_links(ctx, task, handle, html, base);
        }
    }

    let mut errors = collector.finish();
    if errors.is_empty() {
        guard.close().await;
        return Ok(Vec::new());
    }

    let meta = html.as_deref().and_then(parser::ignore_meta_value);
    ignore::resolve(meta.as_deref()).apply(&mut errors);

    guard.close().await;

    Ok(errors.into_iter().filter(|e| !e.ignored).collect())
}

/// Queues the page's in-scope, not-yet-discovered links
///
/// The check-and-insert against the discovered set happens under a single
/// lock acquisition, so two workers racing on the same link cannot both
/// queue it.
fn expand_links(
    ctx: &CrawlContext,
    task: &CrawlTask,
    handle: &PoolHandle<CrawlTask>,
    html: &str,
    base: &Url,
) {
    let child_depth = task.remaining_depth.map(|d| d.saturating_sub(1));
    let mut queued = 0usize;

    for link in parser::extract_links(html, base) {
        if !is_in_scope(&link, &ctx.base, &ctx.exclusions) {
            continue;
        }
        let normalized = normalize_url(&link);
        let is_new = ctx
            .discovered
            .lock()
            .expect("discovered-links lock poisoned")
            .insert(normalized.clone());
        if is_new {
            handle.submit(CrawlTask {
                url: normalized,
                parent_url: task.url.clone(),
                remaining_depth: child_depth,
            });
            queued += 1;
        }
    }

    if queued > 0 {
        tracing::debug!("queued {} new link(s) from {}", queued, task.url);
    }
}
