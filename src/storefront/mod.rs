use anyhow::Context;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::StorefrontConfig;
use crate::{Result, ScribeError};

pub mod selectors;

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// A live browser session against the storefront
///
/// Owns the Chrome process, one page and the task that drives the CDP event
/// loop. Dropping the session kills the browser; `close` shuts it down
/// cleanly.
pub struct StorefrontSession {
    browser: Browser,
    page: Page,
    event_loop: JoinHandle<()>,
    settings: StorefrontConfig,
}

impl StorefrontSession {
    /// Launch the browser with the configured viewport and open a blank page
    pub async fn launch(settings: &StorefrontConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(ScribeError::Browser)?;

        tracing::debug!(headless = settings.headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        // The handler carries all CDP traffic and must be polled for the
        // lifetime of the session.
        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            event_loop,
            settings: settings.clone(),
        })
    }

    /// The page this session drives
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Fill the sign-in form and submit it
    ///
    /// Credentials are typed with a per-keystroke delay. The site shows either
    /// a two-stage continue flow or a direct sign-in button; whichever is
    /// present gets clicked, followed by the configured settle wait.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        tracing::info!(url = %self.settings.signin_url, "Opening sign-in page");
        self.page.goto(self.settings.signin_url.as_str()).await?;

        let email_field = self.wait_for_element(selectors::EMAIL_FIELD).await?;
        self.type_slowly(&email_field, email).await?;

        let password_field = self.wait_for_element(selectors::PASSWORD_FIELD).await?;
        self.type_slowly(&password_field, password).await?;

        if let Ok(button) = self.page.find_element(selectors::CONTINUE_BUTTON).await {
            tracing::debug!("Submitting via continue button");
            button.click().await?;
            self.settle().await;
        } else if let Ok(button) = self.page.find_element(selectors::SIGNIN_BUTTON).await {
            tracing::debug!("Submitting via sign-in button");
            button.click().await?;
            self.settle().await;
        } else {
            tracing::warn!("Neither submit button found on the sign-in page");
        }

        Ok(())
    }

    /// Navigate to the library listing and search for a title
    ///
    /// Search interaction failures are logged and tolerated; the caller still
    /// gets a chance to match against whatever rows are on the page.
    pub async fn open_library(&self, title: &str) -> Result<()> {
        tracing::info!(url = %self.settings.library_url, "Opening library");
        self.page.goto(self.settings.library_url.as_str()).await?;

        if let Err(e) = self.search_library(title).await {
            tracing::warn!("Library search interaction failed: {e:#}");
        }

        Ok(())
    }

    async fn search_library(&self, title: &str) -> Result<()> {
        let search = self.wait_for_element(selectors::LIBRARY_SEARCH).await?;
        search.click().await?;
        search.type_str(title).await?;
        search.press_key("Enter").await?;
        self.wait_for_element(selectors::LIBRARY_ROW).await?;
        Ok(())
    }

    /// Click the download button of the first library row matching the title
    ///
    /// Returns whether a download was actually triggered. A missing row or
    /// button is not an error; the storefront flow is best-effort.
    pub async fn trigger_download(&self, title: &str) -> Result<bool> {
        let rows = self
            .page
            .find_elements(selectors::LIBRARY_ROW)
            .await
            .unwrap_or_default();
        tracing::debug!(rows = rows.len(), "Scanning library rows");

        let mut matched = None;
        for row in rows {
            let text = row.inner_text().await.ok().flatten().unwrap_or_default();
            if text.contains(title) {
                matched = Some(row);
                break;
            }
        }

        let row = match matched {
            Some(row) => row,
            None => {
                tracing::warn!(%title, "No library row matched the title");
                return Ok(false);
            }
        };

        match row.find_element(selectors::DOWNLOAD_BUTTON).await {
            Ok(button) => {
                button.scroll_into_view().await?;
                button.click().await?;
                tracing::info!(%title, "Download button clicked");
                Ok(true)
            }
            Err(_) => {
                tracing::warn!(%title, "Matched row has no download button");
                Ok(false)
            }
        }
    }

    /// Shut the browser down
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.event_loop.abort();
        Ok(())
    }

    /// Poll for a selector until it appears or the wait times out
    ///
    /// CDP clients have no wait-for-selector primitive, so this polls the DOM
    /// at a fixed interval under a deadline.
    async fn wait_for_element(&self, selector: &str) -> Result<Element> {
        let deadline = tokio::time::Instant::now() + ELEMENT_WAIT_TIMEOUT;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScribeError::SelectorNotFound(selector.to_string()).into());
            }
            sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    /// Focus an element and type text one keystroke at a time
    async fn type_slowly(&self, element: &Element, text: &str) -> Result<()> {
        element.click().await?;
        let delay = Duration::from_millis(self.settings.type_delay_ms);
        for ch in text.chars() {
            element.type_str(ch.to_string()).await?;
            sleep(delay).await;
        }
        Ok(())
    }

    /// Fixed pause after submit clicks so the site can settle
    async fn settle(&self) {
        sleep(Duration::from_secs(self.settings.post_click_wait_secs)).await;
    }
}
