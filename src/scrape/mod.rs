//! Listing → drill-down → detail extraction pipeline.

pub mod detail;
pub mod listing;
pub mod navigator;
pub mod orchestrator;

pub use detail::extract_detail;
pub use listing::parse_candidates;
pub use navigator::{drill_down, DrillDown, DrillDownFailure, DrillDownPlan};
pub use orchestrator::{start, start_with_id, ProgressStream, RunOptions, RunSummary};
