//! One isolated browser session.
//!
//! Each lookup gets its own `BrowserSession` owning a dedicated Chromium
//! process and one page. Nothing is shared between concurrent sessions, so
//! scraper calls cannot observe each other's navigation state. The session
//! must be closed on every exit path; [`BrowserSession::close`] consumes it
//! and a `Drop` fallback aborts the handler task if close was skipped.

use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A single-use browser session with a per-step timeout on every action.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    step_timeout: Duration,
}

impl BrowserSession {
    /// Launch a fresh Chromium process and open one blank page.
    pub async fn launch(headless: bool, step_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match timeout(step_timeout, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                handler_task.abort();
                return Err(BrowserError::Chromium(e.to_string()));
            }
            Err(_) => {
                handler_task.abort();
                return Err(BrowserError::Timeout(step_timeout, "new page".into()));
            }
        };

        tracing::debug!(headless, "browser session launched");

        Ok(Self {
            browser,
            page,
            handler_task,
            step_timeout,
        })
    }

    /// Navigate the page to a URL and wait for the load to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let nav = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            Ok(())
        };
        timeout(self.step_timeout, nav)
            .await
            .map_err(|_| BrowserError::Timeout(self.step_timeout, format!("navigate {url}")))?
    }

    /// Type a value into the element matching `selector`.
    pub async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let fill = async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| BrowserError::Chromium(e.to_string()))?;
            element
                .type_str(value)
                .await
                .map_err(|e| BrowserError::Chromium(e.to_string()))?;
            Ok(())
        };
        timeout(self.step_timeout, fill)
            .await
            .map_err(|_| BrowserError::Timeout(self.step_timeout, selector.to_string()))?
    }

    /// Click the element matching `selector`.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let click = async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| BrowserError::Chromium(e.to_string()))?;
            Ok(())
        };
        timeout(self.step_timeout, click)
            .await
            .map_err(|_| BrowserError::Timeout(self.step_timeout, selector.to_string()))?
    }

    /// Wait until `selector` matches an element, up to `wait`.
    ///
    /// Fails with [`BrowserError::Timeout`] when the element never appears.
    pub async fn wait_for_selector(&self, selector: &str, wait: Duration) -> Result<()> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        timeout(wait, poll)
            .await
            .map_err(|_| BrowserError::Timeout(wait, selector.to_string()))
    }

    /// Probe for an element that may legitimately be absent.
    ///
    /// Returns `false` on timeout instead of an error. Used for optional
    /// page controls where absence is a valid outcome, not a failure.
    pub async fn probe_selector(&self, selector: &str, wait: Duration) -> bool {
        self.wait_for_selector(selector, wait).await.is_ok()
    }

    /// Extract the inner text of the element matching `selector`.
    pub async fn extract_text(&self, selector: &str) -> Result<String> {
        let extract = async {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
            let text = element
                .inner_text()
                .await
                .map_err(|e| BrowserError::Chromium(e.to_string()))?;
            Ok(text.unwrap_or_default())
        };
        timeout(self.step_timeout, extract)
            .await
            .map_err(|_| BrowserError::Timeout(self.step_timeout, selector.to_string()))?
    }

    /// Fetch the page's current HTML.
    pub async fn content(&self) -> Result<String> {
        timeout(self.step_timeout, self.page.content())
            .await
            .map_err(|_| BrowserError::Timeout(self.step_timeout, "page content".into()))?
            .map_err(|e| BrowserError::Chromium(e.to_string()))
    }

    /// Close the session, shutting down the Chromium process.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("browser wait after close: {e}");
        }
        self.handler_task.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Close was skipped (panic or early return); at minimum stop
        // pumping CDP events so the task does not outlive the session.
        self.handler_task.abort();
    }
}
