use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{PageSession, PageSource};
use crate::fetch_error::FetchError;

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One headless Chromium process; every session is a fresh tab on it
#[derive(Clone)]
pub struct BrowserSource {
    browser: Arc<Browser>,
    handler: Arc<JoinHandle<()>>,
}

impl BrowserSource {
    #[instrument(skip(options), fields(executable = ?options.executable, sandbox = options.sandbox))]
    pub async fn launch(options: BrowserOptions) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder().request_timeout(options.request_timeout);
        if let Some(executable) = options.executable {
            builder = builder.chrome_executable(executable);
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(FetchError::Launch)?;

        debug!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config).await?;

        // The CDP connection only makes progress while the handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        info!("Headless browser launched");
        Ok(Self {
            browser: Arc::new(browser),
            handler: Arc::new(handler),
        })
    }

    /// Close the browser once no other clone of this source is alive
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser cleanly: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Failed waiting for browser exit: {}", e);
                }
                info!("Headless browser closed");
            }
            Err(_) => debug!("Browser still shared, leaving it running"),
        }
        if let Ok(handler) = Arc::try_unwrap(self.handler) {
            handler.abort();
        }
    }
}

impl PageSource for BrowserSource {
    type Session = BrowserSession;

    async fn open(&self) -> Result<BrowserSession, FetchError> {
        let page = self.browser.new_page("about:blank").await?;
        debug!("Opened browser tab");
        Ok(BrowserSession { page })
    }
}

pub struct BrowserSession {
    page: Page,
}

impl PageSession for BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.page.goto(url).await?;
        Ok(())
    }

    /// Fragment-only URL changes keep the old DOM alive, so blank the tab first
    async fn clear(&mut self) -> Result<(), FetchError> {
        self.page.goto("about:blank").await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        Ok(self.page.content().await?)
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!("Failed to close browser tab: {}", e);
        }
    }
}
