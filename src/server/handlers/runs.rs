//! Run listing and cancellation API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::super::registry::RunInfo;
use super::super::AppState;

/// List active and recently finished runs.
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunInfo>> {
    Json(state.registry.list().await)
}

/// Request cancellation of a run. The run stops before its next parcel.
pub async fn cancel_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> StatusCode {
    if state.registry.cancel(run_id).await {
        tracing::info!(%run_id, "Cancellation requested");
        StatusCode::ACCEPTED
    } else {
        StatusCode::NOT_FOUND
    }
}
