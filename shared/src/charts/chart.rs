use crate::charts::extracted::ExtractedData;
use crate::charts::manifest::ManifestEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Set by a manual correction. Automatic extraction never replaces it.
    Manual,
}

impl Display for ExtractionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionStatus::Pending => write!(f, "pending"),
            ExtractionStatus::Processing => write!(f, "processing"),
            ExtractionStatus::Completed => write!(f, "completed"),
            ExtractionStatus::Failed => write!(f, "failed"),
            ExtractionStatus::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub id: String,
    pub airport_icao: String,
    pub airport_name: String,
    pub document_type: String,
    /// AIRAC cycle label.
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub file_size_bytes: u64,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub is_downloaded: bool,
    pub is_outdated: bool,
    pub extraction_status: ExtractionStatus,
    pub extracted_data: Option<ExtractedData>,
}

impl Chart {
    /// A not-yet-downloaded chart as first seen in the manifest.
    pub fn from_manifest(entry: &ManifestEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: entry.id.clone(),
            airport_icao: entry.airport_icao.clone(),
            airport_name: entry.airport_name.clone(),
            document_type: entry.document_type.clone(),
            version: entry.version.clone(),
            effective_date: entry.effective_date,
            expiry_date: entry.expiry_date,
            file_size_bytes: entry.file_size_bytes,
            downloaded_at: None,
            last_accessed_at: None,
            is_downloaded: false,
            is_outdated: now > entry.expiry_date,
            extraction_status: ExtractionStatus::Pending,
            extracted_data: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}

/// Small record persisted apart from the chart table.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub selected_airport: Option<String>,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn entry(expiry: DateTime<Utc>) -> ManifestEntry {
        ManifestEntry {
            id: "LFPG-VAC-2024-01".to_string(),
            airport_icao: "LFPG".to_string(),
            airport_name: "Paris Charles de Gaulle".to_string(),
            document_type: "VAC".to_string(),
            version: "2401".to_string(),
            effective_date: expiry - TimeDelta::days(28),
            expiry_date: expiry,
            file_size_bytes: 1024,
        }
    }

    #[test]
    fn manifest_chart_starts_pending_and_not_downloaded() {
        let now = Utc::now();
        let chart = Chart::from_manifest(&entry(now + TimeDelta::days(3)), now);
        assert!(!chart.is_downloaded);
        assert!(!chart.is_outdated);
        assert_eq!(chart.extraction_status, ExtractionStatus::Pending);
        assert!(chart.extracted_data.is_none());
    }

    #[test]
    fn manifest_chart_past_expiry_is_outdated() {
        let now = Utc::now();
        let chart = Chart::from_manifest(&entry(now - TimeDelta::days(1)), now);
        assert!(chart.is_outdated);
        assert!(chart.is_expired_at(now));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ExtractionStatus::Manual).expect("serialize");
        assert_eq!(json, "\"manual\"");
    }
}
