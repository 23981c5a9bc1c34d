//! Session acquisition for callers that start many runs.

use async_trait::async_trait;

use super::{BrowserEngineConfig, ChromeSession, PageDriver};
use crate::config::TimingConfig;
use crate::error::BrowserError;

/// Produces a fresh, exclusively owned browser session per run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, BrowserError>;
}

/// Launches Chrome sessions from configuration.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    browser: BrowserEngineConfig,
    timing: TimingConfig,
}

impl ChromeLauncher {
    pub fn new(browser: BrowserEngineConfig, timing: TimingConfig) -> Self {
        Self { browser, timing }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let session = ChromeSession::launch(&self.browser, &self.timing).await?;
        Ok(Box::new(session))
    }
}
