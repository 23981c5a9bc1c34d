//! Chrome session over the DevTools protocol.

#[cfg(feature = "browser")]
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tokio::time::Instant;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::config::BrowserEngineConfig;
#[cfg(feature = "browser")]
use super::navigation::{mark_script, marked_script, wait_for_replacement, DocumentMarker};
#[cfg(feature = "browser")]
use super::query::{id_selector, link_containing_text};
use super::PageDriver;
#[cfg(feature = "browser")]
use crate::config::SettleStrategy;
use crate::config::TimingConfig;
use crate::error::BrowserError;

/// One Chrome tab owned by a single scrape run.
#[cfg(feature = "browser")]
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    settle: SettleStrategy,
    open_settle: Duration,
    poll_interval: Duration,
    /// How long a history traversal may take to commit.
    back_timeout: Duration,
    next_token: u64,
}

#[cfg(feature = "browser")]
impl ChromeSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    /// Launch (or connect to) a browser and open a blank tab.
    pub async fn launch(
        config: &BrowserEngineConfig,
        timing: &TimingConfig,
    ) -> Result<Self, BrowserError> {
        let (mut browser, handler) = match config.remote_url.as_deref() {
            Some(remote_url) => Self::connect_remote(remote_url, config).await?,
            None => Self::launch_local(config).await?,
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await.ok();
                handler.abort();
                return Err(BrowserError::Launch(format!("failed to open tab: {e}")));
            }
        };

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            settle: timing.settle,
            open_settle: timing.open_settle(),
            poll_interval: timing.poll_interval(),
            back_timeout: timing.click_timeout(),
            next_token: 0,
        })
    }

    /// Find Chrome executable.
    fn find_chrome(config: &BrowserEngineConfig) -> Result<PathBuf, BrowserError> {
        if let Some(ref path) = config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(BrowserError::NotFound(format!(
                "configured chrome_path {path:?} does not exist"
            )));
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in Self::CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(BrowserError::NotFound(
            "install chromium or google-chrome, or set browser.chrome_path".to_string(),
        ))
    }

    async fn launch_local(
        config: &BrowserEngineConfig,
    ) -> Result<(Browser, JoinHandle<()>), BrowserError> {
        info!("Launching browser (headless={})", config.headless);

        let chrome_path = Self::find_chrome(config)?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(config.request_timeout_secs));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok((browser, Self::spawn_handler(handler)))
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(
        url: &str,
        config: &BrowserEngineConfig,
    ) -> Result<(Browser, JoinHandle<()>), BrowserError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| BrowserError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| BrowserError::Remote(format!("bad version info: {e}")))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::Remote("no webSocketDebuggerUrl in response".into()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| BrowserError::Remote(e.to_string()))?;

        Ok((browser, Self::spawn_handler(handler)))
    }

    fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }

    async fn ready_state(page: &Page) -> Option<String> {
        page.evaluate("document.readyState")
            .await
            .ok()
            .and_then(|r| r.into_value::<String>().ok())
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Settle on `readyState` regardless of the configured strategy.
    ///
    /// Only called once a new document has committed, so its state is meaningful.
    async fn settle_loaded(&mut self) {
        let previous = self.settle;
        self.settle = SettleStrategy::ReadyState;
        let ceiling = self.open_settle;
        self.settle(ceiling).await;
        self.settle = previous;
    }
}

/// Tags documents in one tab by evaluating script on `window`.
#[cfg(feature = "browser")]
struct TabDocument<'a> {
    page: &'a Page,
}

#[cfg(feature = "browser")]
#[async_trait]
impl<'a> DocumentMarker for TabDocument<'a> {
    async fn mark(&mut self, token: u64) -> Result<(), BrowserError> {
        self.page
            .evaluate(mark_script(token))
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn is_marked(&mut self, token: u64) -> Option<bool> {
        self.page
            .evaluate(marked_script(token))
            .await
            .ok()
            .and_then(|r| r.into_value::<bool>().ok())
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeSession {
    async fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        info!("Opening URL: {}", url);
        self.page()?
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let ceiling = self.open_settle;
        self.settle(ceiling).await;
        Ok(())
    }

    async fn current_html(&mut self) -> Result<String, BrowserError> {
        self.page()?
            .content()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn click_element_containing_text(
        &mut self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let xpath = link_containing_text(text);
        let deadline = Instant::now() + timeout;
        let token = self.next_token();
        let page = self.page()?.clone();
        let mut document = TabDocument { page: &page };
        document.mark(token).await?;

        loop {
            let attempt = match page.find_xpath(xpath.as_str()).await {
                Ok(element) => element.click().await.map(|_| ()),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(()) => break,
                Err(e) if Instant::now() >= deadline => {
                    debug!("Giving up on '{}': {}", text, e);
                    return Err(BrowserError::ElementNotInteractable {
                        text: text.to_string(),
                        timeout,
                    });
                }
                Err(_) => tokio::time::sleep(self.poll_interval).await,
            }
        }

        if !wait_for_replacement(&mut document, token, timeout, self.poll_interval).await {
            return Err(BrowserError::NavigationTimeout {
                action: format!("clicking '{text}'"),
                timeout,
            });
        }
        if let Ok(Some(url)) = page.url().await {
            debug!("Current URL after clicking '{}': {}", text, url);
        }

        self.settle_loaded().await;
        Ok(())
    }

    async fn wait_for_element_by_id(&mut self, id: &str, timeout: Duration) -> bool {
        let Ok(page) = self.page() else {
            return false;
        };
        let selector = id_selector(id);
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector.as_str()).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        let token = self.next_token();
        let timeout = self.back_timeout;
        let page = self.page()?.clone();
        let mut document = TabDocument { page: &page };
        document.mark(token).await?;

        // The context may be torn down before the evaluation answers.
        if let Err(e) = page.evaluate("window.history.back()").await {
            debug!("history.back() returned an error: {}", e);
        }

        if !wait_for_replacement(&mut document, token, timeout, self.poll_interval).await {
            return Err(BrowserError::NavigationTimeout {
                action: "going back".to_string(),
                timeout,
            });
        }

        self.settle_loaded().await;
        Ok(())
    }

    async fn settle(&mut self, ceiling: Duration) {
        match self.settle {
            SettleStrategy::Fixed => tokio::time::sleep(ceiling).await,
            SettleStrategy::ReadyState => {
                let Some(page) = self.page.clone() else {
                    return;
                };
                let deadline = Instant::now() + ceiling;
                // Give a pending navigation a chance to replace the old document first.
                tokio::time::sleep(self.poll_interval.min(ceiling)).await;
                while Instant::now() < deadline {
                    if Self::ready_state(&page).await.as_deref() == Some("complete") {
                        return;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                debug!("Page not complete after {:?}; continuing", ceiling);
            }
        }
    }

    async fn close(&mut self) {
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            info!("Closing the browser");
            if let Err(e) = browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Waiting for browser exit failed: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[cfg(feature = "browser")]
impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("Browser session dropped without close()");
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeSession {
    _private: (),
}

#[cfg(not(feature = "browser"))]
impl ChromeSession {
    pub async fn launch(
        _config: &BrowserEngineConfig,
        _timing: &TimingConfig,
    ) -> Result<Self, BrowserError> {
        Err(BrowserError::Unsupported)
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for ChromeSession {
    async fn open(&mut self, _url: &str) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported)
    }

    async fn current_html(&mut self) -> Result<String, BrowserError> {
        Err(BrowserError::Unsupported)
    }

    async fn click_element_containing_text(
        &mut self,
        _text: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported)
    }

    async fn wait_for_element_by_id(&mut self, _id: &str, _timeout: Duration) -> bool {
        false
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported)
    }

    async fn settle(&mut self, _ceiling: Duration) {}

    async fn close(&mut self) {}
}
