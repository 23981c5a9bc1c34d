//! Web server for triggering scrapes from a browser.
//!
//! Serves the scrape form, streams run progress as server-sent events,
//! and hands back finished runs as CSV downloads.

mod assets;
mod handlers;
mod registry;
mod routes;

pub use registry::{RunInfo, RunRegistry};
pub use routes::create_router;

use std::sync::Arc;

use crate::browser::{ChromeLauncher, SessionLauncher};
use crate::config::Settings;
use crate::scrape::RunOptions;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    /// Opens one browser session per run.
    pub launcher: Arc<dyn SessionLauncher>,
    pub registry: Arc<RunRegistry>,
    pub run_options: RunOptions,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let launcher = ChromeLauncher::new(settings.browser.clone(), settings.timing.clone());
        Self::with_launcher(settings, Arc::new(launcher))
    }

    pub fn with_launcher(settings: &Settings, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            launcher,
            registry: Arc::new(RunRegistry::new(settings.server.max_concurrent_runs)),
            run_options: RunOptions::from_settings(settings),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings);
    let registry = state.registry.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

async fn shutdown_signal(registry: Arc<RunRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down, cancelling active runs");
    registry.cancel_all().await;
}
