use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the chart provider's manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    pub airport_icao: String,
    pub airport_name: String,
    #[serde(rename = "type")]
    pub document_type: String,
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub file_size_bytes: u64,
}
