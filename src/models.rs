//! Data model shared by the scraper, the exporter and the HTTP layer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A listing entry that has not yet been confirmed to have a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub owner: String,
}

/// Fields read from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detail {
    pub address: String,
    pub total_area: u64,
}

/// A fully extracted parcel record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub id: String,
    pub owner: String,
    pub address: String,
    pub total_area: u64,
}

impl ExtractedRecord {
    pub fn new(candidate: Candidate, detail: Detail) -> Self {
        Self {
            id: candidate.id,
            owner: candidate.owner,
            address: detail.address,
            total_area: detail.total_area,
        }
    }
}

/// Caller-supplied parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start_url: String,
    pub excluded_ids: HashSet<String>,
}

impl RunConfig {
    pub fn new<I, S>(start_url: impl Into<String>, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start_url: start_url.into(),
            excluded_ids: excluded.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parse a comma-separated exclusion list, dropping blanks.
pub fn parse_exclusions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Started,
    Processing,
    /// Terminal: every candidate was attempted.
    Done,
    /// Terminal: the listing produced no candidates.
    Aborted,
    /// Terminal: cancelled by the caller or the run deadline.
    Cancelled,
    /// Terminal: the run could not proceed.
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Done | RunPhase::Aborted | RunPhase::Cancelled | RunPhase::Failed
        )
    }
}

/// One progress value in a run's event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub status: String,
    pub phase: RunPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<ExtractedRecord>>,
}

impl ProgressSnapshot {
    pub fn started(total: usize) -> Self {
        Self::new(0, total, "Starting", RunPhase::Started)
    }

    pub fn processing(processed: usize, total: usize, id: &str) -> Self {
        Self::new(processed, total, format!("Processing {id}"), RunPhase::Processing)
    }

    pub fn done(total: usize, records: Vec<ExtractedRecord>) -> Self {
        Self {
            records: Some(records),
            ..Self::new(total, total, "Done", RunPhase::Done)
        }
    }

    pub fn no_candidates() -> Self {
        Self::new(0, 0, "No parcels found", RunPhase::Aborted)
    }

    pub fn cancelled(
        processed: usize,
        total: usize,
        reason: &str,
        records: Vec<ExtractedRecord>,
    ) -> Self {
        Self {
            records: Some(records),
            ..Self::new(processed, total, reason, RunPhase::Cancelled)
        }
    }

    pub fn failed(processed: usize, total: usize, reason: &str) -> Self {
        Self::new(processed, total, format!("Failed: {reason}"), RunPhase::Failed)
    }

    fn new(processed: usize, total: usize, status: impl Into<String>, phase: RunPhase) -> Self {
        Self {
            processed,
            total,
            status: status.into(),
            phase,
            records: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
