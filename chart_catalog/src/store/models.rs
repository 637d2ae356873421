use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::charts::{Chart, ExtractedData, ExtractionStatus};
use sqlx::types::Json;
use std::num::TryFromIntError;

#[derive(Debug, sqlx::FromRow, Clone)]
pub(crate) struct ChartRow {
    pub id: String,
    pub airport_icao: String,
    pub airport_name: String,
    pub document_type: String,
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub file_size_bytes: i64,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub is_downloaded: bool,
    pub is_outdated: bool,
    pub extraction_status: ExtractionStatus,
    pub extracted_data: Option<Json<ExtractedData>>,
}

impl TryFrom<ChartRow> for Chart {
    type Error = TryFromIntError;

    fn try_from(row: ChartRow) -> Result<Self, Self::Error> {
        Ok(Chart {
            id: row.id,
            airport_icao: row.airport_icao,
            airport_name: row.airport_name,
            document_type: row.document_type,
            version: row.version,
            effective_date: row.effective_date,
            expiry_date: row.expiry_date,
            file_size_bytes: u64::try_from(row.file_size_bytes)?,
            downloaded_at: row.downloaded_at,
            last_accessed_at: row.last_accessed_at,
            is_downloaded: row.is_downloaded,
            is_outdated: row.is_outdated,
            extraction_status: row.extraction_status,
            extracted_data: row.extracted_data.map(|Json(data)| data),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BlobRow {
    pub payload_compressed: Vec<u8>,
    pub original_size_bytes: i64,
    pub compression_algo: String,
}

/// Per-airport rollup of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AirportSummary {
    pub icao: String,
    pub name: String,
    pub chart_count: i64,
    pub downloaded_count: i64,
}

/// Optional equality filters over the indexed chart columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartFilter {
    pub airport_icao: Option<String>,
    pub document_type: Option<String>,
    pub version: Option<String>,
    pub is_downloaded: Option<bool>,
    pub is_outdated: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub inserted: u64,
    pub updated: u64,
}
