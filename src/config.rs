//! Configuration management for parcelscrape.
//!
//! Settings come from an optional TOML file, then environment overrides.
//! Every field has a default, so running without a config file is normal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::error::ConfigError;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "parcelscrape.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "PARCELSCRAPE_CONFIG";

/// Environment variable carrying the listen port.
pub const PORT_ENV: &str = "PORT";

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserEngineConfig,
    pub timing: TimingConfig,
    pub page: PageIdentifiers,
    pub server: ServerConfig,
}

/// How the renderer decides a page has finished rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Poll `document.readyState`, bounded by the settle interval.
    #[default]
    ReadyState,
    /// Always sleep for the full settle interval.
    Fixed,
}

/// Waits and timeouts used while driving the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle: SettleStrategy,
    /// Upper bound (or fixed delay) after opening a URL.
    pub open_settle_ms: u64,
    /// Upper bound (or fixed delay) after back-navigation.
    pub back_settle_ms: u64,
    pub poll_interval_ms: u64,
    pub click_timeout_secs: u64,
    pub marker_timeout_secs: u64,
    /// Deadline for a whole run. Unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_deadline_secs: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle: SettleStrategy::ReadyState,
            open_settle_ms: 3000,
            back_settle_ms: 2000,
            poll_interval_ms: 100,
            click_timeout_secs: 20,
            marker_timeout_secs: 5,
            run_deadline_secs: None,
        }
    }
}

impl TimingConfig {
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    pub fn back_settle(&self) -> Duration {
        Duration::from_millis(self.back_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_secs(self.click_timeout_secs)
    }

    pub fn marker_timeout(&self) -> Duration {
        Duration::from_secs(self.marker_timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

/// Element identifiers on the target site's detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageIdentifiers {
    /// Element whose presence confirms a valid detail page.
    pub marker_id: String,
    pub location_id: String,
    pub first_floor_id: String,
    pub second_floor_id: String,
}

impl Default for PageIdentifiers {
    fn default() -> Self {
        Self {
            marker_id: "lblLocation".to_string(),
            location_id: "lblLocation".to_string(),
            first_floor_id: "lblFirstFloor".to_string(),
            second_floor_id: "lblSecondFloor".to_string(),
        }
    }
}

/// HTTP trigger interface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Each run owns one browser session; this caps how many exist at once.
    pub max_concurrent_runs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            max_concurrent_runs: 2,
        }
    }
}

impl Settings {
    /// Load settings, returning the file they came from (if any).
    ///
    /// Lookup order: explicit path, `$PARCELSCRAPE_CONFIG`, then
    /// `./parcelscrape.toml`. `$PORT` overrides the server port.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut settings = match &path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            settings.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV}={port} is not a port")))?;
        }

        settings.validate()?;
        Ok((settings, path))
    }

    /// Parse settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values the scraper cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.server.max_concurrent_runs == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        let ids = [
            ("page.marker_id", &self.page.marker_id),
            ("page.location_id", &self.page.location_id),
            ("page.first_floor_id", &self.page.first_floor_id),
            ("page.second_floor_id", &self.page.second_floor_id),
        ];
        for (name, value) in ids {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
