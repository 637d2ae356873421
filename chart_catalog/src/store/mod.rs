//! Durable chart catalog: chart metadata, document blobs and the session record.

mod models;
mod sqlite;

pub use models::{AirportSummary, ChartFilter, MergeReport};
pub use sqlite::SqliteChartStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::charts::{Chart, ExtractedData, ExtractionStatus, ManifestEntry, SessionRecord};

#[async_trait]
pub trait ChartStore: Send + Sync {
    /// Every chart, ordered by airport, document type, then id.
    async fn load_all(&self) -> Result<Vec<Chart>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Chart>, StoreError>;

    async fn list_filtered(&self, filter: &ChartFilter) -> Result<Vec<Chart>, StoreError>;

    /// Inserts unseen ids and refreshes descriptive fields of known ones.
    /// Download, extraction and correction state is never touched.
    async fn merge_manifest(
        &self,
        entries: &[ManifestEntry],
        now: DateTime<Utc>,
    ) -> Result<MergeReport, StoreError>;

    /// Upserts metadata as given. Fails with [`StoreError::MissingBlob`] if the
    /// chart claims to be downloaded without a stored blob.
    async fn put(&self, chart: &Chart) -> Result<(), StoreError>;

    async fn put_blob(&self, id: &str, bytes: &[u8], now: DateTime<Utc>)
    -> Result<(), StoreError>;

    /// Raw document bytes; bumps `last_accessed_at` when found.
    async fn get_blob(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Vec<u8>>, StoreError>;

    /// Flips the download flag. Only succeeds when the blob is already stored.
    async fn mark_downloaded(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Moves a chart to `Processing` unless it is `Manual`.
    async fn begin_extraction(&self, id: &str) -> Result<bool, StoreError>;

    /// Records an extraction outcome. A `Manual` chart is only overwritten when
    /// `overwrite_manual` is set; the check and the write are one statement.
    /// `None` data keeps whatever was stored before.
    async fn record_extraction(
        &self,
        id: &str,
        status: ExtractionStatus,
        data: Option<&ExtractedData>,
        overwrite_manual: bool,
    ) -> Result<bool, StoreError>;

    /// Persists `(id, is_outdated)` pairs, returning how many rows changed.
    async fn set_outdated(&self, flags: &[(String, bool)]) -> Result<u64, StoreError>;

    /// Removes metadata and blob together. Returns whether anything existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Removes every chart and blob and resets the session record.
    async fn clear(&self) -> Result<(), StoreError>;

    async fn airports(&self) -> Result<Vec<AirportSummary>, StoreError>;

    async fn load_session(&self) -> Result<SessionRecord, StoreError>;

    async fn save_selected_airport(&self, icao: Option<&str>) -> Result<(), StoreError>;

    async fn save_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}
