//! Router configuration for the web server.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/scrape", post(handlers::start_scrape))
        .route("/download/:filename", get(handlers::download_csv))
        // Run management API
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/runs/:run_id", delete(handlers::cancel_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
