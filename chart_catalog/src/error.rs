use chart_extractor::{ExtractionError, ExtractorBuildError};
use std::num::TryFromIntError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("extracted data serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("blob compression failed: {0}")]
    Compress(#[from] std::io::Error),
    #[error("value out of range for storage: {0}")]
    PayloadTooLarge(#[from] TryFromIntError),
    #[error("unsupported blob compression {0}")]
    UnsupportedCompression(String),
    #[error("chart {0} is marked downloaded but has no stored blob")]
    MissingBlob(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),
    #[error("invalid chart source base url {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("chart fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("background extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("download queue closed: {0}")]
    QueueClosed(#[from] tokio::sync::AcquireError),
    #[error("unknown chart {0}")]
    UnknownChart(String),
    #[error("chart {0} has not been downloaded")]
    NotDownloaded(String),
    #[error("chart {0} carries manual corrections")]
    ManualRecord(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Extractor(#[from] ExtractorBuildError),
    #[error("failed to build chart source client: {0}")]
    Source(#[from] FetchError),
}

/// SQLite primary result code for a full database or disk.
const SQLITE_FULL: &str = "13";

impl StoreError {
    /// The database or the disk under it has no room for the write.
    pub fn is_storage_full(&self) -> bool {
        match self {
            StoreError::Db(sqlx::Error::Database(e)) => e.code().as_deref() == Some(SQLITE_FULL),
            StoreError::Db(sqlx::Error::Io(e)) | StoreError::Compress(e) => {
                e.kind() == std::io::ErrorKind::StorageFull
            }
            _ => false,
        }
    }
}

impl CatalogError {
    /// A failed fetch leaves metadata untouched, so the download can simply
    /// be requested again.
    pub fn is_retryable_download(&self) -> bool {
        matches!(self, CatalogError::Fetch(_))
    }

    /// The blob is stored; only the extraction step needs re-running.
    pub fn is_retryable_extraction(&self) -> bool {
        matches!(self, CatalogError::Extraction(_) | CatalogError::Join(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_hints_follow_failing_step() {
        let extraction = CatalogError::from(ExtractionError::EmptyTextLayer);
        assert!(extraction.is_retryable_extraction());
        assert!(!extraction.is_retryable_download());

        let storage = CatalogError::from(StoreError::MissingBlob("LFPG".to_string()));
        assert!(!storage.is_retryable_download());
        assert!(!storage.is_retryable_extraction());
    }

    #[test]
    fn storage_full_covers_disk_errors_only() {
        let full = std::io::Error::from(std::io::ErrorKind::StorageFull);
        assert!(StoreError::Compress(full).is_storage_full());
        assert!(StoreError::Db(sqlx::Error::Io(std::io::ErrorKind::StorageFull.into())).is_storage_full());

        let other = std::io::Error::from(std::io::ErrorKind::InvalidData);
        assert!(!StoreError::Compress(other).is_storage_full());
        assert!(!StoreError::MissingBlob("LFPG".to_string()).is_storage_full());
    }
}
