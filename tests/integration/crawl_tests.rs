//! Integration tests for the crawl engine
//!
//! These tests drive the full scheduler, pool and page-task pipeline over an
//! in-memory page provider. Each test declares a small site as a map from
//! URL to per-attempt page behavior and asserts on the visits made and the
//! errors that survive into the store.

use async_trait::async_trait;
use site_warden::browser::{
    BrowserError, EventSubscription, PageEvent, PageHandle, PageProvider, WaitMode,
};
use site_warden::classify::ErrorKind;
use site_warden::config::CrawlerOptions;
use site_warden::crawler::crawl;
use site_warden::ignore::IGNORE_META_NAME;
use site_warden::report;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Behavior of one page for one attempt
#[derive(Debug, Clone, Default)]
struct PageSpec {
    /// Hrefs rendered as anchor tags
    links: Vec<String>,

    /// Extra markup placed in the head, e.g. an ignore declaration
    head: String,

    /// Navigation fails with this reason
    nav_error: Option<String>,

    /// Error-level console messages emitted during rendering
    console_errors: Vec<String>,

    /// Failed sub-requests as (resource URL, reason)
    failed_requests: Vec<(String, String)>,

    /// Session crash emitted during rendering
    crash: Option<String>,

    /// Reading the rendered content fails with this backend fault
    content_error: Option<String>,
}

impl PageSpec {
    fn with_links(links: &[&str]) -> Self {
        Self {
            links: links.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// An in-memory site: per-URL, per-attempt page behavior
#[derive(Default)]
struct MockSite {
    pages: HashMap<String, Vec<PageSpec>>,
    visits: Mutex<Vec<String>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl MockSite {
    fn new() -> Self {
        Self::default()
    }

    /// Declares a page that behaves the same on every attempt
    fn page(mut self, url: &str, spec: PageSpec) -> Self {
        self.pages.insert(url.to_string(), vec![spec]);
        self
    }

    /// Declares a page whose behavior changes per attempt; the last spec
    /// repeats once attempts run past the list
    fn page_attempts(mut self, url: &str, specs: Vec<PageSpec>) -> Self {
        self.pages.insert(url.to_string(), specs);
        self
    }

    fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    fn visit_count(&self, url: &str) -> usize {
        self.visits.lock().unwrap().iter().filter(|v| *v == url).count()
    }

    /// Records a visit and returns the spec for this attempt
    fn spec_for(&self, url: &str) -> PageSpec {
        self.visits.lock().unwrap().push(url.to_string());

        let mut attempts = self.attempts.lock().unwrap();
        let counter = attempts.entry(url.to_string()).or_insert(0);
        let attempt = *counter;
        *counter += 1;
        drop(attempts);

        match self.pages.get(url) {
            Some(specs) => specs
                .get(attempt)
                .or(specs.last())
                .cloned()
                .unwrap_or_default(),
            // Undeclared pages render empty and clean
            None => PageSpec::default(),
        }
    }
}

struct MockProvider {
    site: Arc<MockSite>,
}

#[async_trait]
impl PageProvider for MockProvider {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        Ok(Box::new(MockPage {
            site: self.site.clone(),
            state: Mutex::new(MockPageState::default()),
        }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockPageState {
    events: Option<mpsc::UnboundedSender<PageEvent>>,
    spec: Option<PageSpec>,
}

struct MockPage {
    site: Arc<MockSite>,
    state: Mutex<MockPageState>,
}

#[async_trait]
impl PageHandle for MockPage {
    async fn subscribe(&self) -> Result<EventSubscription, BrowserError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().events = Some(tx);
        Ok(EventSubscription::new(rx, Vec::new()))
    }

    async fn navigate(&self, url: &str, _wait: WaitMode) -> Result<(), BrowserError> {
        let spec = self.site.spec_for(url);

        let mut state = self.state.lock().unwrap();
        if let Some(events) = &state.events {
            for (resource, reason) in &spec.failed_requests {
                let _ = events.send(PageEvent::RequestFailed {
                    url: resource.clone(),
                    reason: reason.clone(),
                });
            }
            for message in &spec.console_errors {
                let _ = events.send(PageEvent::ConsoleError {
                    message: message.clone(),
                });
            }
            if let Some(message) = &spec.crash {
                let _ = events.send(PageEvent::Crashed {
                    message: message.clone(),
                });
            }
        }

        let nav_error = spec.nav_error.clone();
        state.spec = Some(spec);
        drop(state);

        match nav_error {
            Some(reason) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let spec = self
            .state
            .lock()
            .unwrap()
            .spec
            .clone()
            .expect("content read before navigation");

        if let Some(message) = &spec.content_error {
            return Err(BrowserError::Backend(message.clone()));
        }

        let anchors: String = spec
            .links
            .iter()
            .map(|link| format!(r#"<a href="{}">link</a>"#, link))
            .collect();
        Ok(format!(
            "<html><head>{}</head><body>{}</body></html>",
            spec.head, anchors
        ))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

fn test_options(url: &str) -> CrawlerOptions {
    let mut options = CrawlerOptions::new(url);
    options.concurrency = 4;
    options.timeout_ms = 5_000;
    options.retries = 0;
    options.retry_delay_ms = 1;
    options.silent = true;
    options
}

fn ignore_meta(json: &str) -> String {
    format!(r#"<meta name="{}" content='{}'>"#, IGNORE_META_NAME, json)
}

async fn run_crawl(site: MockSite, options: CrawlerOptions) -> (Arc<MockSite>, site_warden::RunResult) {
    let site = Arc::new(site);
    let provider = Arc::new(MockProvider { site: site.clone() });
    let result = crawl(options, provider).await.expect("crawl failed");
    (site, result)
}

#[tokio::test]
async fn test_crawls_all_reachable_pages() {
    let site = MockSite::new()
        .page(
            "https://example.com/",
            PageSpec::with_links(&["/a", "/b"]),
        )
        .page("https://example.com/a", PageSpec::with_links(&["/c"]));

    let (site, result) = run_crawl(site, test_options("https://example.com/")).await;

    let mut visits = site.visits();
    visits.sort();
    assert_eq!(
        visits,
        vec![
            "https://example.com/",
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c"
        ]
    );
    assert!(result.store.is_empty());
    assert_eq!(report::exit_code(&result.store), 0);
    assert_eq!(result.pages_crawled, 4);
}

#[tokio::test]
async fn test_scope_and_exclusions() {
    // Out-of-scope and excluded links produce no tasks beyond the seed and /a
    let site = MockSite::new().page(
        "https://example.com/",
        PageSpec::with_links(&[
            "https://example.com/a",
            "https://other.com/b",
            "https://example.com/excluded/x",
        ]),
    );

    let mut options = test_options("https://example.com/");
    options.exclusions = vec!["/excluded/".to_string()];
    let (site, result) = run_crawl(site, options).await;

    let mut visits = site.visits();
    visits.sort();
    assert_eq!(visits, vec!["https://example.com/", "https://example.com/a"]);
    assert!(result.store.is_empty());
}

#[tokio::test]
async fn test_shared_link_crawled_once() {
    // Two sibling pages race to discover the same link; the check-and-insert
    // into the discovered set must let exactly one submission through
    let site = MockSite::new()
        .page(
            "https://example.com/",
            PageSpec::with_links(&["/a", "/b"]),
        )
        .page("https://example.com/a", PageSpec::with_links(&["/shared"]))
        .page("https://example.com/b", PageSpec::with_links(&["/shared"]));

    let (site, _result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(site.visit_count("https://example.com/shared"), 1);
}

#[tokio::test]
async fn test_link_back_to_seed_not_recrawled() {
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/a"]))
        .page(
            "https://example.com/a",
            PageSpec::with_links(&["https://example.com/"]),
        );

    let (site, _result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(site.visit_count("https://example.com/"), 1);
}

#[tokio::test]
async fn test_depth_limit_stops_expansion() {
    // depth 1: /a is visited with no hops left, so /b is never discovered
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/a"]))
        .page("https://example.com/a", PageSpec::with_links(&["/b"]));

    let mut options = test_options("https://example.com/");
    options.depth = Some(1);
    let (site, result) = run_crawl(site, options).await;

    assert_eq!(site.visit_count("https://example.com/a"), 1);
    assert_eq!(site.visit_count("https://example.com/b"), 0);
    assert!(result.store.is_empty());
}

#[tokio::test]
async fn test_depth_zero_visits_only_the_seed() {
    let site = MockSite::new().page("https://example.com/", PageSpec::with_links(&["/a"]));

    let mut options = test_options("https://example.com/");
    options.depth = Some(0);
    let (site, _result) = run_crawl(site, options).await;

    assert_eq!(site.visit_count("https://example.com/"), 1);
    assert_eq!(site.visit_count("https://example.com/a"), 0);
}

#[tokio::test]
async fn test_unbounded_depth_follows_chains() {
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/1"]))
        .page("https://example.com/1", PageSpec::with_links(&["/2"]))
        .page("https://example.com/2", PageSpec::with_links(&["/3"]))
        .page("https://example.com/3", PageSpec::with_links(&["/4"]));

    let (site, _result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(site.visit_count("https://example.com/4"), 1);
}

#[tokio::test]
async fn test_declared_console_error_is_ignored() {
    let spec = PageSpec {
        console_errors: vec!["a known-warning happened".to_string()],
        head: ignore_meta(r#"{"console": ["known-warning"]}"#),
        ..PageSpec::default()
    };
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/a"]))
        .page("https://example.com/a", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    assert!(result.store.is_empty());
    assert_eq!(report::exit_code(&result.store), 0);
}

#[tokio::test]
async fn test_wildcard_ignores_one_kind_only() {
    let spec = PageSpec {
        console_errors: vec!["anything".to_string(), "something else".to_string()],
        failed_requests: vec![(
            "https://example.com/img.png".to_string(),
            "net::ERR_ABORTED".to_string(),
        )],
        head: ignore_meta(r#"{"console": "*"}"#),
        ..PageSpec::default()
    };
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/a"]))
        .page("https://example.com/a", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(result.store.len(), 1);
    let (page_url, errors) = result.store.pages().next().unwrap();
    assert_eq!(page_url, "https://example.com/a");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::RequestFailure);
    assert_eq!(report::exit_code(&result.store), 1);
}

#[tokio::test]
async fn test_malformed_ignore_declaration_fails_open() {
    let spec = PageSpec {
        console_errors: vec!["boom".to_string()],
        head: ignore_meta("{not valid json"),
        ..PageSpec::default()
    };
    let site = MockSite::new().page("https://example.com/", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(result.store.len(), 1);
    assert_eq!(report::exit_code(&result.store), 1);
}

#[tokio::test]
async fn test_retried_errors_are_discarded() {
    // Fails twice, passes on the final attempt: nothing may reach the store
    let failing = PageSpec {
        console_errors: vec!["transient".to_string()],
        ..PageSpec::default()
    };
    let site = MockSite::new().page_attempts(
        "https://example.com/",
        vec![failing.clone(), failing, PageSpec::default()],
    );

    let mut options = test_options("https://example.com/");
    options.retries = 2;
    let (site, result) = run_crawl(site, options).await;

    assert_eq!(site.visit_count("https://example.com/"), 3);
    assert!(result.store.is_empty());
    assert_eq!(report::exit_code(&result.store), 0);
}

#[tokio::test]
async fn test_final_attempt_errors_are_recorded() {
    let first = PageSpec {
        console_errors: vec!["first attempt".to_string()],
        ..PageSpec::default()
    };
    let last = PageSpec {
        console_errors: vec!["final attempt".to_string()],
        ..PageSpec::default()
    };
    let site = MockSite::new().page_attempts("https://example.com/", vec![first, last]);

    let mut options = test_options("https://example.com/");
    options.retries = 1;
    let (site, result) = run_crawl(site, options).await;

    assert_eq!(site.visit_count("https://example.com/"), 2);
    assert_eq!(result.store.len(), 1);
    let (_, errors) = result.store.pages().next().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "final attempt");
}

#[tokio::test]
async fn test_plumbing_fault_reported_as_page_crash() {
    let spec = PageSpec {
        content_error: Some("boom".to_string()),
        ..PageSpec::default()
    };
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/x"]))
        .page("https://example.com/x", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    let (page_url, errors) = result
        .store
        .pages()
        .find(|(url, _)| *url == "https://example.com/x")
        .unwrap();
    assert_eq!(page_url, "https://example.com/x");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::PageCrash);
    assert!(
        errors[0].message.contains("Error crawling /x: boom"),
        "unexpected message: {}",
        errors[0].message
    );
}

#[tokio::test]
async fn test_seed_navigation_failure_recorded_once() {
    let spec = PageSpec {
        nav_error: Some("net::ERR_CONNECTION_REFUSED".to_string()),
        ..PageSpec::default()
    };
    let site = MockSite::new().page("https://example.com/", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(result.store.len(), 1);
    let (page_url, errors) = result.store.pages().next().unwrap();
    assert_eq!(page_url, "https://example.com/");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Navigation);
    assert_eq!(errors[0].message, "net::ERR_CONNECTION_REFUSED");
    assert_eq!(report::exit_code(&result.store), 1);
}

#[tokio::test]
async fn test_own_url_request_failure_suppresses_navigation_error() {
    let spec = PageSpec {
        nav_error: Some("net::ERR_CONNECTION_REFUSED".to_string()),
        failed_requests: vec![(
            "https://example.com/p".to_string(),
            "net::ERR_CONNECTION_REFUSED".to_string(),
        )],
        ..PageSpec::default()
    };
    let site = MockSite::new()
        .page("https://example.com/", PageSpec::with_links(&["/p"]))
        .page("https://example.com/p", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    let (_, errors) = result
        .store
        .pages()
        .find(|(url, _)| *url == "https://example.com/p")
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::RequestFailure);
}

#[tokio::test]
async fn test_navigation_failure_skips_link_expansion() {
    let spec = PageSpec {
        nav_error: Some("net::ERR_ABORTED".to_string()),
        links: vec!["/never".to_string()],
        ..PageSpec::default()
    };
    let site = MockSite::new().page("https://example.com/", spec);

    let (site, result) = run_crawl(site, test_options("https://example.com/")).await;

    assert_eq!(site.visit_count("https://example.com/never"), 0);
    assert_eq!(result.store.len(), 1);
}

#[tokio::test]
async fn test_crash_event_prefixed_with_page_url() {
    let spec = PageSpec {
        crash: Some("rendering target crashed".to_string()),
        ..PageSpec::default()
    };
    let site = MockSite::new().page("https://example.com/", spec);

    let (_site, result) = run_crawl(site, test_options("https://example.com/")).await;

    let (_, errors) = result.store.pages().next().unwrap();
    assert_eq!(errors[0].kind, ErrorKind::PageCrash);
    assert!(errors[0].message.starts_with("https://example.com/"));
}
