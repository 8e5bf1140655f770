//! Final error report and exit status
//!
//! The store accumulates one error list per page, written once per page when
//! that page's task fails terminally. The reporter renders everything in
//! insertion order so CI logs stay diffable between runs.

use crate::classify::CrawlError;

/// Accumulated terminal errors, one entry per page URL
#[derive(Debug, Default)]
pub struct ErrorStore {
    pages: Vec<(String, Vec<CrawlError>)>,
}

impl ErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the final errors for a page
    ///
    /// A page's task is dequeued at most once, so each URL is recorded at
    /// most once; a repeat would indicate a dedup violation upstream and is
    /// logged rather than silently merged.
    pub fn record(&mut self, page_url: &str, errors: Vec<CrawlError>) {
        if errors.is_empty() {
            return;
        }
        if self.pages.iter().any(|(url, _)| url == page_url) {
            tracing::error!("duplicate error record for {}, keeping the first", page_url);
            return;
        }
        self.pages.push((page_url.to_string(), errors));
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of pages with errors
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Pages and their errors in insertion order
    pub fn pages(&self) -> impl Iterator<Item = (&str, &[CrawlError])> {
        self.pages
            .iter()
            .map(|(url, errors)| (url.as_str(), errors.as_slice()))
    }

    /// Total number of recorded errors
    pub fn error_count(&self) -> usize {
        self.pages.iter().map(|(_, errors)| errors.len()).sum()
    }
}

/// The process exit code for a finished run: 1 iff any page has errors
pub fn exit_code(store: &ErrorStore) -> i32 {
    if store.is_empty() {
        0
    } else {
        1
    }
}

/// Prints the full report grouped by page URL
pub fn report(store: &ErrorStore) {
    if store.is_empty() {
        println!("✓ No errors found");
        return;
    }

    println!(
        "✗ {} error(s) on {} page(s):",
        store.error_count(),
        store.len()
    );

    for (page_url, errors) in store.pages() {
        println!();
        println!("{}", page_url);
        for error in errors {
            match &error.failed_url {
                Some(failed_url) => {
                    println!("  [{}] {} ({})", error.kind, error.message, failed_url)
                }
                None => println!("  [{}] {}", error.kind, error.message),
            }
        }
    }
}
