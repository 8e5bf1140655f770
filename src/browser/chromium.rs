//! Headless Chromium adapter
//!
//! Implements the rendering traits over chromiumoxide. Each page task gets
//! its own tab; error-relevant DevTools events are forwarded into the
//! [`EventSubscription`] channel by small background tasks that die with the
//! subscription.

use crate::browser::{
    BrowserError, EventSubscription, PageEvent, PageHandle, PageProvider, WaitMode,
};
use crate::config::CrawlerOptions;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::inspector;
use chromiumoxide::cdp::browser_protocol::network;
use chromiumoxide::cdp::browser_protocol::page as page_cdp;
use chromiumoxide::cdp::js_protocol::runtime;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Upper bound on waiting for the network-idle lifecycle signal. Pages with
/// long-polling scripts never settle; the load event has already fired by
/// the time this runs out.
const NETWORK_IDLE_GRACE: Duration = Duration::from_secs(10);

/// A shared headless Chromium instance
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launches a headless browser configured from the crawl options
    pub async fn launch(options: &CrawlerOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(options.timeout_ms))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if options.disable_browser_sandbox {
            builder = builder.no_sandbox();
        }
        if options.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }

        let config = builder.build().map_err(BrowserError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drive the CDP connection until the browser goes away
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

#[async_trait]
impl PageProvider for ChromiumBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::OpenPage(e.to_string()))?
        };

        // The network and inspector domains do not emit events until enabled
        page.execute(network::EnableParams::default())
            .await
            .map_err(|e| BrowserError::OpenPage(format!("failed to enable network events: {e}")))?;
        page.execute(runtime::EnableParams::default())
            .await
            .map_err(|e| BrowserError::OpenPage(format!("failed to enable runtime events: {e}")))?;
        page.execute(inspector::EnableParams::default())
            .await
            .map_err(|e| BrowserError::OpenPage(format!("failed to enable inspector events: {e}")))?;

        let lifecycle = page_cdp::SetLifecycleEventsEnabledParams::builder()
            .enabled(true)
            .build()
            .map_err(BrowserError::OpenPage)?;
        page.execute(lifecycle)
            .await
            .map_err(|e| BrowserError::OpenPage(format!("failed to enable lifecycle events: {e}")))?;

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map_err(|e| BrowserError::Backend(format!("failed to close browser: {e}")))?;
        }
        self.handler.abort();
        Ok(())
    }
}

/// One Chromium tab
pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn subscribe(&self) -> Result<EventSubscription, BrowserError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut forwarders = Vec::new();

        // Loading failures only carry a request id; correlate them with the
        // request URLs seen on the same session.
        let mut requests = self
            .page
            .event_listener::<network::EventRequestWillBeSent>()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to listen for requests: {e}")))?;
        let mut failures = self
            .page
            .event_listener::<network::EventLoadingFailed>()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to listen for failures: {e}")))?;
        let failure_tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            let mut request_urls: HashMap<network::RequestId, String> = HashMap::new();
            loop {
                tokio::select! {
                    Some(request) = requests.next() => {
                        request_urls
                            .insert(request.request_id.clone(), request.request.url.clone());
                    }
                    Some(failure) = failures.next() => {
                        let url = request_urls
                            .get(&failure.request_id)
                            .cloned()
                            .unwrap_or_default();
                        let _ = failure_tx.send(PageEvent::RequestFailed {
                            url,
                            reason: failure.error_text.clone(),
                        });
                    }
                    else => break,
                }
            }
        }));

        let mut console = self
            .page
            .event_listener::<runtime::EventConsoleApiCalled>()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to listen for console: {e}")))?;
        let console_tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(entry) = console.next().await {
                if matches!(entry.r#type, runtime::ConsoleApiCalledType::Error) {
                    let _ = console_tx.send(PageEvent::ConsoleError {
                        message: format_console_args(&entry.args),
                    });
                }
            }
        }));

        let mut exceptions = self
            .page
            .event_listener::<runtime::EventExceptionThrown>()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to listen for exceptions: {e}")))?;
        let exception_tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(thrown) = exceptions.next().await {
                let _ = exception_tx.send(PageEvent::Crashed {
                    message: format_exception(&thrown.exception_details),
                });
            }
        }));

        let mut crashes = self
            .page
            .event_listener::<inspector::EventTargetCrashed>()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to listen for crashes: {e}")))?;
        let crash_tx = tx;
        forwarders.push(tokio::spawn(async move {
            while crashes.next().await.is_some() {
                let _ = crash_tx.send(PageEvent::Crashed {
                    message: "rendering target crashed".to_string(),
                });
            }
        }));

        Ok(EventSubscription::new(rx, forwarders))
    }

    async fn navigate(&self, url: &str, wait: WaitMode) -> Result<(), BrowserError> {
        // Subscribe before navigating; the networkIdle signal fires once per
        // navigation and would otherwise be missed.
        let lifecycle = match wait {
            WaitMode::NetworkIdle => Some(
                self.page
                    .event_listener::<page_cdp::EventLifecycleEvent>()
                    .await
                    .map_err(|e| {
                        BrowserError::Backend(format!("failed to listen for lifecycle: {e}"))
                    })?,
            ),
            WaitMode::Load => None,
        };

        self.page.goto(url).await.map_err(|e| BrowserError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        self.page
            .wait_for_navigation()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(mut lifecycle) = lifecycle {
            let idle = async {
                while let Some(event) = lifecycle.next().await {
                    if event.name == "networkIdle" {
                        break;
                    }
                }
            };
            let _ = tokio::time::timeout(NETWORK_IDLE_GRACE, idle).await;
        }

        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to read page content: {e}")))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::Backend(format!("failed to close page: {e}")))
    }
}

/// Renders console call arguments the way DevTools would print them
fn format_console_args(args: &[runtime::RemoteObject]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| {
            if let Some(value) = &arg.value {
                match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            } else if let Some(description) = &arg.description {
                description.clone()
            } else {
                String::new()
            }
        })
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(" ")
}

fn format_exception(details: &runtime::ExceptionDetails) -> String {
    if let Some(exception) = &details.exception {
        if let Some(description) = &exception.description {
            return description.clone();
        }
    }
    details.text.clone()
}
