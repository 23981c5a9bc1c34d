//! Scrape run orchestration.
//!
//! A run walks `Idle -> Listing -> (Navigating -> Extracting -> Recording) x N
//! -> Done`, or ends early as `Aborted` (empty listing), `Cancelled`, or
//! `Failed`. The run body executes on its own task, owns the browser session,
//! and reports through a bounded channel of [`ProgressSnapshot`]s. The session
//! is closed exactly once when the body returns, whichever way it returns.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{FutureExt, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::detail::extract_detail;
use super::listing::parse_candidates;
use super::navigator::{drill_down, DrillDownPlan};
use crate::browser::PageDriver;
use crate::config::{PageIdentifiers, Settings};
use crate::error::ScrapeError;
use crate::models::{
    Candidate, Detail, ExtractedRecord, ProgressSnapshot, RunConfig, RunPhase,
};

/// Default buffer between the run task and its consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Per-run knobs derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plan: DrillDownPlan,
    pub page_ids: PageIdentifiers,
    pub back_settle: Duration,
    pub deadline: Option<Duration>,
    pub channel_capacity: usize,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            plan: DrillDownPlan {
                click_timeout: settings.timing.click_timeout(),
                marker_timeout: settings.timing.marker_timeout(),
                marker_id: settings.page.marker_id.clone(),
            },
            page_ids: settings.page.clone(),
            back_settle: settings.timing.back_settle(),
            deadline: settings.timing.run_deadline(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub candidates: usize,
    pub processed: usize,
    pub skipped: usize,
    pub records: Vec<ExtractedRecord>,
}

/// Start a run on its own task, taking ownership of the driver.
pub fn start<D>(driver: D, config: RunConfig, options: RunOptions) -> ProgressStream
where
    D: PageDriver + 'static,
{
    start_with_id(Uuid::new_v4(), driver, config, options)
}

/// Like [`start`], with a caller-chosen run id.
pub fn start_with_id<D>(
    run_id: Uuid,
    driver: D,
    config: RunConfig,
    options: RunOptions,
) -> ProgressStream
where
    D: PageDriver + 'static,
{
    let (tx, receiver) = mpsc::channel(options.channel_capacity.max(1));
    let cancel = CancellationToken::new();

    let run = Run {
        run_id,
        driver,
        config,
        options,
        cancel: cancel.clone(),
        tx,
        total: 0,
        processed: 0,
        skipped: 0,
        records: Vec::new(),
    };
    let handle = tokio::spawn(run.execute().instrument(info_span!("run", %run_id)));

    ProgressStream {
        run_id,
        receiver,
        cancel,
        handle: Some(handle),
    }
}

/// Consumer side of a run: a lazy sequence of progress snapshots.
///
/// Dropping the stream cancels the run; the session is still closed.
pub struct ProgressStream {
    run_id: Uuid,
    receiver: mpsc::Receiver<ProgressSnapshot>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<RunSummary, ScrapeError>>>,
}

impl ProgressStream {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next snapshot, or `None` once the run has ended.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        self.receiver.recv().await
    }

    /// Ask the run to stop before its next candidate.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to end, discarding snapshots not yet consumed.
    pub async fn finish(mut self) -> Result<RunSummary, ScrapeError> {
        while self.receiver.recv().await.is_some() {}
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| ScrapeError::Panicked(e.to_string()))?,
            None => Err(ScrapeError::Cancelled),
        }
    }
}

impl Stream for ProgressStream {
    type Item = ProgressSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run-side state. Only this struct holds cross-candidate state.
struct Run<D> {
    run_id: Uuid,
    driver: D,
    config: RunConfig,
    options: RunOptions,
    cancel: CancellationToken,
    tx: mpsc::Sender<ProgressSnapshot>,
    total: usize,
    processed: usize,
    skipped: usize,
    records: Vec<ExtractedRecord>,
}

impl<D: PageDriver> Run<D> {
    async fn execute(mut self) -> Result<RunSummary, ScrapeError> {
        let body = AssertUnwindSafe(self.drive()).catch_unwind().await;

        let outcome = match body {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Run aborted: {}", message);
                self.emit(ProgressSnapshot::failed(self.processed, self.total, &message))
                    .await;
                Err(ScrapeError::Panicked(message))
            }
        };

        self.driver.close().await;
        outcome
    }

    async fn drive(&mut self) -> Result<RunSummary, ScrapeError> {
        let started = Instant::now();
        let deadline_at = self.options.deadline.map(|d| started + d);

        info!("Starting run at {}", self.config.start_url);
        let candidates = match self.load_listing().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("{}", e);
                self.emit(ProgressSnapshot::failed(0, 0, &e.to_string())).await;
                return Err(e);
            }
        };

        if candidates.is_empty() {
            self.emit(ProgressSnapshot::no_candidates()).await;
            return Ok(self.summary(RunPhase::Aborted));
        }

        self.total = candidates.len();
        if !self.emit(ProgressSnapshot::started(self.total)).await {
            return Ok(self.abandoned());
        }

        let cancel = self.cancel.clone();
        let tx = self.tx.clone();

        for (index, candidate) in candidates.into_iter().enumerate() {
            if let Some(reason) = self.stop_reason(deadline_at) {
                return Ok(self.stop(reason).await);
            }
            let snapshot = ProgressSnapshot::processing(index, self.total, &candidate.id);
            if !self.emit(snapshot).await {
                return Ok(self.abandoned());
            }

            info!("Processing parcel: {}", candidate.id);
            let id = candidate.id.clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(self.stop(ScrapeError::Cancelled).await);
                }
                _ = tx.closed() => {
                    return Ok(self.abandoned());
                }
                _ = sleep_until(deadline_at) => {
                    let limit = self.options.deadline.unwrap_or_default();
                    return Ok(self.stop(ScrapeError::DeadlineExceeded(limit)).await);
                }
                result = AssertUnwindSafe(self.process(candidate)).catch_unwind() => {
                    if let Err(payload) = result {
                        error!("Parcel {} aborted: {}", id, panic_message(payload.as_ref()));
                        self.skipped += 1;
                        self.recover().await;
                    }
                }
            }
            self.processed = index + 1;
        }

        info!(
            "Run finished: {} of {} parcels extracted",
            self.records.len(),
            self.total
        );
        let records = std::mem::take(&mut self.records);
        self.emit(ProgressSnapshot::done(self.total, records.clone()))
            .await;

        Ok(RunSummary {
            records,
            ..self.summary(RunPhase::Done)
        })
    }

    async fn load_listing(&mut self) -> Result<Vec<Candidate>, ScrapeError> {
        self.driver
            .open(&self.config.start_url)
            .await
            .map_err(ScrapeError::Listing)?;
        let html = self
            .driver
            .current_html()
            .await
            .map_err(ScrapeError::Listing)?;
        Ok(parse_candidates(&html, &self.config.excluded_ids))
    }

    /// Drill into one candidate, record it if possible, and return to the listing.
    async fn process(&mut self, candidate: Candidate) {
        match drill_down(&mut self.driver, &candidate.id, &self.options.plan).await {
            Err(failure) => {
                warn!("Skipping parcel {}: {}", candidate.id, failure);
                self.skipped += 1;
                if failure.depth_is_known() {
                    self.back_out(failure.levels_entered()).await;
                } else {
                    self.recover().await;
                }
            }
            Ok(drilled) => {
                match self.read_detail().await {
                    Ok(detail) => self.records.push(ExtractedRecord::new(candidate, detail)),
                    Err(e) => {
                        warn!("No record for parcel {}: {}", candidate.id, e);
                        self.skipped += 1;
                    }
                }
                self.back_out(drilled.levels_entered).await;
            }
        }
    }

    async fn read_detail(&mut self) -> Result<Detail, ScrapeError> {
        let html = self
            .driver
            .current_html()
            .await
            .map_err(|e| ScrapeError::MalformedDetailPage(e.to_string()))?;
        extract_detail(&html, &self.options.page_ids)
    }

    /// Undo exactly the navigation levels a drill-down entered.
    ///
    /// Each step settles before the next; a step that fails leaves the depth
    /// unknown, so the listing is reopened instead.
    async fn back_out(&mut self, levels: usize) {
        for _ in 0..levels {
            if let Err(e) = self.driver.go_back().await {
                warn!("Back navigation failed: {}", e);
                self.recover().await;
                return;
            }
            self.driver.settle(self.options.back_settle).await;
        }
    }

    /// Return to the listing after a candidate ended at an unknown depth.
    async fn recover(&mut self) {
        if let Err(e) = self.driver.open(&self.config.start_url).await {
            warn!("Could not reopen listing: {}", e);
        }
    }

    fn stop_reason(&self, deadline_at: Option<Instant>) -> Option<ScrapeError> {
        if self.cancel.is_cancelled() {
            return Some(ScrapeError::Cancelled);
        }
        match (deadline_at, self.options.deadline) {
            (Some(at), Some(limit)) if Instant::now() >= at => {
                Some(ScrapeError::DeadlineExceeded(limit))
            }
            _ => None,
        }
    }

    /// End early, reporting the records gathered so far.
    async fn stop(&mut self, reason: ScrapeError) -> RunSummary {
        warn!("Stopping run: {}", reason);
        let records = std::mem::take(&mut self.records);
        self.emit(ProgressSnapshot::cancelled(
            self.processed,
            self.total,
            &reason.to_string(),
            records.clone(),
        ))
        .await;
        RunSummary {
            records,
            ..self.summary(RunPhase::Cancelled)
        }
    }

    /// Consumer went away; nobody is left to report to.
    fn abandoned(&mut self) -> RunSummary {
        info!("Progress consumer gone; stopping run");
        RunSummary {
            records: std::mem::take(&mut self.records),
            ..self.summary(RunPhase::Cancelled)
        }
    }

    fn summary(&self, phase: RunPhase) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            phase,
            candidates: self.total,
            processed: self.processed,
            skipped: self.skipped,
            records: Vec::new(),
        }
    }

    async fn emit(&mut self, snapshot: ProgressSnapshot) -> bool {
        self.tx.send(snapshot).await.is_ok()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
