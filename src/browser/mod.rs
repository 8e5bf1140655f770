//! Page-rendering collaborator interface
//!
//! The crawler does not implement a browser; it consumes one through the
//! object-safe [`PageProvider`] and [`PageHandle`] traits. The production
//! implementation in [`chromium`] drives a headless Chromium instance over
//! the DevTools protocol; tests substitute in-memory fakes.

pub mod chromium;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Browser-layer errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    OpenPage(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Raw backend fault, message composed at the call site
    #[error("{0}")]
    Backend(String),
}

/// How long navigation waits before the page counts as rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Wait for the load event only
    Load,
    /// Wait for the network to go idle after the load event
    NetworkIdle,
}

/// Error-relevant events emitted by a rendering session
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A sub-resource request failed
    RequestFailed { url: String, reason: String },
    /// The page logged an error-level console message
    ConsoleError { message: String },
    /// The session crashed or raised an uncaught fault
    Crashed { message: String },
}

/// A live subscription to one page's [`PageEvent`] stream
///
/// Dropping the subscription aborts the forwarder tasks feeding it, so
/// listeners never leak past the owning page task.
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<PageEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

impl EventSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<PageEvent>, forwarders: Vec<JoinHandle<()>>) -> Self {
        Self { rx, forwarders }
    }

    /// Takes every event buffered so far
    pub fn drain(&mut self) -> Vec<PageEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}

/// Opens rendering sessions; one per page task
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>, BrowserError>;

    /// Shuts the provider down after the crawl has drained
    async fn shutdown(&self) -> Result<(), BrowserError>;
}

/// One rendering session
///
/// `subscribe` must be called before `navigate` so that events raised during
/// navigation are observed.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn subscribe(&self) -> Result<EventSubscription, BrowserError>;

    async fn navigate(&self, url: &str, wait: WaitMode) -> Result<(), BrowserError>;

    /// The rendered DOM serialized back to HTML
    async fn content(&self) -> Result<String, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}
