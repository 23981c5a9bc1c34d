//! CSV download endpoint.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use super::super::AppState;
use crate::export::{normalize_filename, to_csv};
use crate::models::ExtractedRecord;

/// Where the exported rows come from.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// A finished run held by the registry.
    pub run: Option<Uuid>,
    /// Inline JSON: an array of records or of `[parcel, owner, address, sqft]` rows.
    pub data: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DownloadRow {
    Record(ExtractedRecord),
    Row(String, String, String, u64),
}

impl From<DownloadRow> for ExtractedRecord {
    fn from(row: DownloadRow) -> Self {
        match row {
            DownloadRow::Record(record) => record,
            DownloadRow::Row(id, owner, address, total_area) => ExtractedRecord {
                id,
                owner,
                address,
                total_area,
            },
        }
    }
}

fn parse_rows(data: &str) -> Result<Vec<ExtractedRecord>, serde_json::Error> {
    let rows: Vec<DownloadRow> = serde_json::from_str(data)?;
    Ok(rows.into_iter().map(ExtractedRecord::from).collect())
}

/// Serve records as a CSV attachment.
pub async fn download_csv(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let inline = query.data.as_deref().filter(|d| !d.trim().is_empty());

    let records = match (query.run, inline) {
        (Some(run_id), _) => match state.registry.records(run_id).await {
            Some(records) => records,
            None => return (StatusCode::NOT_FOUND, "No data for run").into_response(),
        },
        (None, Some(data)) => match parse_rows(data) {
            Ok(records) => records,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid data: {}", e)).into_response()
            }
        },
        (None, None) => return (StatusCode::BAD_REQUEST, "No data").into_response(),
    };

    let filename = normalize_filename(&filename);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        to_csv(&records),
    )
        .into_response()
}
