//! Rendered-DOM fetch strategy backed by a headless Chromium.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::request::PageFetcher;
use crate::{Error, Result};

/// Loads each page in a fresh browser tab, waits for navigation to finish and
/// returns the rendered document. The whole fetch is bounded by `timeout`.
pub struct RenderedFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
    timeout: Duration,
}

impl RenderedFetcher {
    pub async fn launch(timeout: Duration) -> Result<Self> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|reason| Error::Render {
                url: String::new(),
                reason,
            })?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| Error::Render {
            url: String::new(),
            reason: e.to_string(),
        })?;

        // The CDP event loop has to be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            timeout,
        })
    }

    async fn render(&self, url: &str) -> std::result::Result<String, CdpError> {
        let page = self.browser.new_page(url).await?;
        page.wait_for_navigation().await?;
        let html = page.content().await?;
        if let Err(e) = page.close().await {
            warn!(url, "failed to close page: {e}");
        }
        Ok(html)
    }
}

#[async_trait]
impl PageFetcher for RenderedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.render(url)).await {
            Ok(Ok(html)) => {
                debug!(url, bytes = html.len(), "rendered page");
                Ok(html)
            }
            Ok(Err(e)) => Err(Error::Render {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Render {
                url: url.to_string(),
                reason: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

impl Drop for RenderedFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
