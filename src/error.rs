//! Error types for browser control, scrape runs, and configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Chrome/Chromium not found: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to connect to remote browser: {0}")]
    Remote(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No clickable element containing '{text}' within {timeout:?}")]
    ElementNotInteractable { text: String, timeout: Duration },

    #[error("No navigation after {action} within {timeout:?}")]
    NavigationTimeout { action: String, timeout: Duration },

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Browser session is closed")]
    Closed,

    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,
}

/// Errors that end a scrape run or a single candidate.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Could not start browser session: {0}")]
    SessionInitialization(#[source] BrowserError),

    #[error("Could not load listing page: {0}")]
    Listing(#[source] BrowserError),

    #[error("Malformed detail page: {0}")]
    MalformedDetailPage(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Run aborted unexpectedly: {0}")]
    Panicked(String),
}

/// Errors loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
