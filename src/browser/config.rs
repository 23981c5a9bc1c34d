//! Browser engine configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the drill-down happen.
    pub headless: bool,

    /// Explicit Chrome/Chromium executable. Auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// CDP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            proxy: None,
            request_timeout_secs: 30,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}
