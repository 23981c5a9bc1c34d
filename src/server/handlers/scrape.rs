//! Run trigger: starts a scrape and streams its progress as server-sent events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderName, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Form,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};
use url::Url;
use uuid::Uuid;

use super::super::registry::RunRegistry;
use super::super::AppState;
use crate::error::ScrapeError;
use crate::export::normalize_filename;
use crate::models::{parse_exclusions, ProgressSnapshot, RunConfig};
use crate::scrape::{start_with_id, ProgressStream};

/// Events buffered for a slow client before the run is held back.
const EVENT_BUFFER: usize = 32;

static RUN_ID_HEADER: HeaderName = HeaderName::from_static("x-run-id");

/// Form fields submitted by the index page.
#[derive(Debug, Deserialize)]
pub struct ScrapeForm {
    pub parent_url: String,
    #[serde(default)]
    pub exclude_parcels: String,
    #[serde(default)]
    pub filename: String,
}

/// Final event telling the client its CSV is ready.
#[derive(Debug, Serialize)]
struct DownloadReady<'a> {
    status: &'static str,
    filename: &'a str,
    run_id: Uuid,
}

fn validate_start_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| format!("Invalid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(format!("Unsupported URL scheme: {}", other)),
    }
}

fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(data) => Event::default().data(data),
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

/// Start a run and respond with its progress stream.
pub async fn start_scrape(State(state): State<AppState>, Form(form): Form<ScrapeForm>) -> Response {
    let start_url = match validate_start_url(&form.parent_url) {
        Ok(url) => url,
        Err(msg) => return (StatusCode::BAD_REQUEST, msg).into_response(),
    };
    let excluded = parse_exclusions(&form.exclude_parcels);
    let filename = normalize_filename(&form.filename);

    let Some(permit) = state.registry.try_acquire() else {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many scrapes in progress").into_response();
    };

    let run_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    match state.launcher.launch().await {
        Ok(driver) => {
            info!(%run_id, url = %start_url, excluded = excluded.len(), "Starting scrape");
            let progress = start_with_id(
                run_id,
                driver,
                RunConfig::new(start_url.clone(), excluded),
                state.run_options.clone(),
            );
            state
                .registry
                .register(run_id, &start_url, &filename, progress.cancellation_token())
                .await;
            tokio::spawn(forward_progress(
                progress,
                state.registry.clone(),
                tx,
                filename,
                permit,
            ));
        }
        Err(e) => {
            error!(%run_id, "Failed to start browser session: {}", e);
            let reason = ScrapeError::SessionInitialization(e).to_string();
            tx.try_send(json_event(&ProgressSnapshot::failed(0, 0, &reason)))
                .ok();
        }
    }

    let events = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    (
        [(RUN_ID_HEADER.clone(), run_id.to_string())],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Relay snapshots to the client and the registry until the run ends.
///
/// A disconnected client cancels the run; snapshots are still drained so the
/// session closes before the slot is released.
async fn forward_progress(
    mut progress: ProgressStream,
    registry: Arc<RunRegistry>,
    tx: mpsc::Sender<Event>,
    filename: String,
    _permit: OwnedSemaphorePermit,
) {
    let run_id = progress.run_id();
    let mut connected = true;

    while let Some(snapshot) = progress.recv().await {
        registry.update(run_id, &snapshot).await;
        if !connected {
            continue;
        }

        let has_records = snapshot
            .records
            .as_ref()
            .is_some_and(|records| !records.is_empty());
        let download = snapshot.is_terminal() && has_records;

        if tx.send(json_event(&snapshot)).await.is_err() {
            info!(%run_id, "Client disconnected, cancelling run");
            progress.cancel();
            connected = false;
            continue;
        }

        if download {
            let ready = DownloadReady {
                status: "download",
                filename: &filename,
                run_id,
            };
            tx.send(json_event(&ready)).await.ok();
        }
    }

    match progress.finish().await {
        Ok(summary) => debug!(
            %run_id,
            processed = summary.processed,
            skipped = summary.skipped,
            "Run finished"
        ),
        Err(e) => debug!(%run_id, "Run ended with error: {}", e),
    }
}
