//! In-memory registry of server-triggered runs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{ExtractedRecord, ProgressSnapshot, RunPhase};

/// Finished runs kept for download before the oldest are evicted.
const MAX_FINISHED_RUNS: usize = 32;

struct RunEntry {
    start_url: String,
    filename: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    phase: RunPhase,
    processed: usize,
    total: usize,
    status: String,
    records: Option<Vec<ExtractedRecord>>,
    cancel: CancellationToken,
}

/// Public view of a run, as listed by `GET /api/runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub start_url: String,
    pub filename: String,
    pub phase: RunPhase,
    pub processed: usize,
    pub total: usize,
    pub status: String,
    pub record_count: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Tracks runs by id and caps how many hold a browser session at once.
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, RunEntry>>,
    slots: Arc<Semaphore>,
}

impl RunRegistry {
    pub fn new(max_concurrent_runs: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Claim a session slot, or `None` when all are in use.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.slots.clone().try_acquire_owned().ok()
    }

    pub async fn register(
        &self,
        run_id: Uuid,
        start_url: &str,
        filename: &str,
        cancel: CancellationToken,
    ) {
        let entry = RunEntry {
            start_url: start_url.to_string(),
            filename: filename.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            phase: RunPhase::Started,
            processed: 0,
            total: 0,
            status: "Starting".to_string(),
            records: None,
            cancel,
        };
        self.runs.write().await.insert(run_id, entry);
    }

    /// Record a snapshot. Terminal snapshots keep their records for download.
    pub async fn update(&self, run_id: Uuid, snapshot: &ProgressSnapshot) {
        let mut runs = self.runs.write().await;
        let Some(entry) = runs.get_mut(&run_id) else {
            return;
        };

        entry.phase = snapshot.phase;
        entry.processed = snapshot.processed;
        entry.total = snapshot.total;
        entry.status = snapshot.status.clone();

        if snapshot.is_terminal() {
            entry.finished_at = Some(Utc::now());
            entry.records = Some(snapshot.records.clone().unwrap_or_default());
            evict_finished(&mut runs);
        }
    }

    /// Request cancellation. Returns `false` for an unknown run.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        match self.runs.read().await.get(&run_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn cancel_all(&self) {
        for entry in self.runs.read().await.values() {
            entry.cancel.cancel();
        }
    }

    /// Records of a finished run.
    pub async fn records(&self, run_id: Uuid) -> Option<Vec<ExtractedRecord>> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .and_then(|entry| entry.records.clone())
    }

    /// All known runs, newest first.
    pub async fn list(&self) -> Vec<RunInfo> {
        let runs = self.runs.read().await;
        let mut infos: Vec<RunInfo> = runs
            .iter()
            .map(|(id, entry)| RunInfo {
                run_id: *id,
                start_url: entry.start_url.clone(),
                filename: entry.filename.clone(),
                phase: entry.phase,
                processed: entry.processed,
                total: entry.total,
                status: entry.status.clone(),
                record_count: entry.records.as_ref().map(Vec::len),
                started_at: entry.started_at,
                finished_at: entry.finished_at,
            })
            .collect();
        infos.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        infos
    }
}

fn evict_finished(runs: &mut HashMap<Uuid, RunEntry>) {
    let mut finished: Vec<(Uuid, DateTime<Utc>)> = runs
        .iter()
        .filter_map(|(id, entry)| entry.finished_at.map(|at| (*id, at)))
        .collect();
    if finished.len() <= MAX_FINISHED_RUNS {
        return;
    }
    finished.sort_by_key(|(_, at)| *at);
    let excess = finished.len() - MAX_FINISHED_RUNS;
    for (id, _) in finished.into_iter().take(excess) {
        runs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ExtractedRecord {
        ExtractedRecord {
            id: id.into(),
            owner: "Owner".into(),
            address: "1 Main St".into(),
            total_area: 100,
        }
    }

    #[test]
    fn slots_are_capped() {
        let registry = RunRegistry::new(1);
        let permit = registry.try_acquire();
        assert!(permit.is_some());
        assert!(registry.try_acquire().is_none());
        drop(permit);
        assert!(registry.try_acquire().is_some());
    }

    #[tokio::test]
    async fn terminal_snapshot_keeps_records() {
        let registry = RunRegistry::new(1);
        let run_id = Uuid::new_v4();
        registry
            .register(run_id, "https://example.test", "out.csv", CancellationToken::new())
            .await;

        registry
            .update(run_id, &ProgressSnapshot::processing(0, 1, "01-001"))
            .await;
        assert!(registry.records(run_id).await.is_none());

        registry
            .update(run_id, &ProgressSnapshot::done(1, vec![record("01-001")]))
            .await;
        let records = registry.records(run_id).await.unwrap();
        assert_eq!(records.len(), 1);

        let listed = registry.list().await;
        assert_eq!(listed[0].phase, RunPhase::Done);
        assert_eq!(listed[0].record_count, Some(1));
    }

    #[tokio::test]
    async fn cancel_reaches_the_run_token() {
        let registry = RunRegistry::new(1);
        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        registry.register(run_id, "u", "f.csv", token.clone()).await;

        assert!(registry.cancel(run_id).await);
        assert!(token.is_cancelled());
        assert!(!registry.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn oldest_finished_runs_are_evicted() {
        let registry = RunRegistry::new(1);
        for _ in 0..MAX_FINISHED_RUNS + 3 {
            let id = Uuid::new_v4();
            registry.register(id, "u", "f.csv", CancellationToken::new()).await;
            registry.update(id, &ProgressSnapshot::done(0, vec![])).await;
        }
        assert_eq!(registry.list().await.len(), MAX_FINISHED_RUNS);
    }
}
