//! Error classification for rendered pages
//!
//! This module turns the raw event stream of one page-rendering session into
//! typed [`CrawlError`] records: navigation failures, failed sub-requests,
//! console errors and session crashes. Records are collected per page and
//! never shared between concurrently rendering pages.

use crate::browser::{EventSubscription, PageEvent};
use std::fmt;

/// Placeholder used when an underlying failure carries no message
pub const EMPTY_MESSAGE: &str = "(empty message)";

/// The closed set of error categories the crawler collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The page itself failed to navigate
    Navigation,
    /// A sub-resource request of the page failed
    RequestFailure,
    /// The page logged an error-level console message
    ConsoleError,
    /// The rendering session crashed or raised an uncaught fault
    PageCrash,
}

impl ErrorKind {
    /// Human-readable label used in the report
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Navigation => "navigation error",
            ErrorKind::RequestFailure => "request failure",
            ErrorKind::ConsoleError => "console error",
            ErrorKind::PageCrash => "page crash",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classified error produced while rendering a page
#[derive(Debug, Clone)]
pub struct CrawlError {
    /// The URL of the page that was being rendered
    pub page_url: String,

    /// Error category
    pub kind: ErrorKind,

    /// Verbatim message from the underlying failure
    pub message: String,

    /// For request failures, the URL of the resource that failed
    pub failed_url: Option<String>,

    /// Set when a page-declared ignore rule matched; never unset
    pub ignored: bool,
}

impl CrawlError {
    pub fn new(page_url: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            page_url: page_url.to_string(),
            kind,
            message: if message.is_empty() {
                EMPTY_MESSAGE.to_string()
            } else {
                message
            },
            failed_url: None,
            ignored: false,
        }
    }

    pub fn request_failure(page_url: &str, failed_url: &str, reason: impl Into<String>) -> Self {
        let mut error = Self::new(page_url, ErrorKind::RequestFailure, reason);
        error.failed_url = Some(failed_url.to_string());
        error
    }
}

/// Collects the classified errors of one rendering session
///
/// The collector owns the session's event subscription; dropping it detaches
/// the underlying listeners, so the subscription cannot outlive the page task
/// on any exit path. A navigation failure is recorded separately and merged
/// in [`ErrorCollector::finish`], where the own-URL deduplication rule runs:
/// a navigation error for the page's own URL is redundant when a request
/// failure for that same URL was already observed.
pub struct ErrorCollector {
    page_url: String,
    subscription: EventSubscription,
    navigation_failure: Option<String>,
}

impl ErrorCollector {
    pub fn new(page_url: &str, subscription: EventSubscription) -> Self {
        Self {
            page_url: page_url.to_string(),
            subscription,
            navigation_failure: None,
        }
    }

    /// Records that navigating to the page itself failed
    pub fn record_navigation_failure(&mut self, reason: &str) {
        self.navigation_failure = Some(if reason.is_empty() {
            EMPTY_MESSAGE.to_string()
        } else {
            reason.to_string()
        });
    }

    /// Drains the session events and returns the classified errors
    ///
    /// Consumes the collector; the subscription is detached on return.
    pub fn finish(mut self) -> Vec<CrawlError> {
        let mut errors = Vec::new();

        for event in self.subscription.drain() {
            match event {
                PageEvent::RequestFailed { url, reason } => {
                    errors.push(CrawlError::request_failure(&self.page_url, &url, reason));
                }
                PageEvent::ConsoleError { message } => {
                    errors.push(CrawlError::new(
                        &self.page_url,
                        ErrorKind::ConsoleError,
                        message,
                    ));
                }
                PageEvent::Crashed { message } => {
                    let message = if message.is_empty() {
                        EMPTY_MESSAGE.to_string()
                    } else {
                        message
                    };
                    errors.push(CrawlError::new(
                        &self.page_url,
                        ErrorKind::PageCrash,
                        format!("{}: {}", self.page_url, message),
                    ));
                }
            }
        }

        if let Some(reason) = self.navigation_failure.take() {
            // A request failure for the page's own URL already describes this
            // navigation failure more precisely. Comparison is literal string
            // equality against the URL as navigated.
            let covered = errors.iter().any(|e| {
                e.kind == ErrorKind::RequestFailure
                    && e.failed_url.as_deref() == Some(self.page_url.as_str())
            });
            if !covered {
                errors.push(CrawlError::new(
                    &self.page_url,
                    ErrorKind::Navigation,
                    reason,
                ));
            } else {
                tracing::debug!(
                    "suppressing navigation error for {}, covered by request failure",
                    self.page_url
                );
            }
        }

        errors
    }
}
