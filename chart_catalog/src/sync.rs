use crate::error::CatalogError;
use crate::store::ChartStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used: u64,
    pub quota: u64,
}

/// Platform storage usage, when the platform can report it.
#[async_trait]
pub trait UsageEstimator: Send + Sync {
    async fn estimate_usage(&self) -> Option<StorageUsage>;
}

pub struct NoUsageApi;

#[async_trait]
impl UsageEstimator for NoUsageApi {
    async fn estimate_usage(&self) -> Option<StorageUsage> {
        None
    }
}

/// Size of the SQLite database file (plus its write-ahead log) against a
/// configured quota.
pub struct DatabaseFileUsage {
    path: PathBuf,
    quota_bytes: u64,
}

impl DatabaseFileUsage {
    pub fn new(path: impl Into<PathBuf>, quota_bytes: u64) -> Self {
        Self {
            path: path.into(),
            quota_bytes,
        }
    }
}

#[async_trait]
impl UsageEstimator for DatabaseFileUsage {
    async fn estimate_usage(&self) -> Option<StorageUsage> {
        let main = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!(name: "sync.usage.unavailable", path = %self.path.display(), error = ?e, "could not read database file size");
                return None;
            }
        };

        let mut wal_path = self.path.clone().into_os_string();
        wal_path.push("-wal");
        let wal = tokio::fs::metadata(&wal_path)
            .await
            .map_or(0, |metadata| metadata.len());

        Some(StorageUsage {
            used: main + wal,
            quota: self.quota_bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub checked: usize,
    pub changed: u64,
    pub outdated: usize,
}

/// `true` when `timestamp` is missing or older than `threshold_minutes`.
pub fn is_stale(timestamp: Option<DateTime<Utc>>, threshold_minutes: i64, now: DateTime<Utc>) -> bool {
    timestamp.is_none_or(|at| now - at > TimeDelta::minutes(threshold_minutes))
}

pub struct SyncCoordinator {
    store: Arc<dyn ChartStore>,
    usage: Arc<dyn UsageEstimator>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn ChartStore>, usage: Arc<dyn UsageEstimator>) -> Self {
        Self { store, usage }
    }

    /// Recomputes every expiry flag against `now` and records the sync time.
    #[instrument(skip(self))]
    pub async fn sync(&self, now: DateTime<Utc>) -> Result<SyncReport, CatalogError> {
        let charts = self.store.load_all().await?;

        let flags: Vec<(String, bool)> = charts
            .iter()
            .filter(|chart| chart.is_outdated != chart.is_expired_at(now))
            .map(|chart| (chart.id.clone(), chart.is_expired_at(now)))
            .collect();

        let changed = if flags.is_empty() {
            0
        } else {
            self.store.set_outdated(&flags).await?
        };
        self.store.save_last_sync(now).await?;

        let report = SyncReport {
            checked: charts.len(),
            changed,
            outdated: charts.iter().filter(|chart| chart.is_expired_at(now)).count(),
        };
        info!(
            name: "sync.completed",
            checked = report.checked,
            changed = report.changed,
            outdated = report.outdated,
            "catalog sync completed"
        );
        Ok(report)
    }

    /// Never fails; an unknown usage is reported as zero of zero.
    pub async fn check_quota(&self) -> StorageUsage {
        self.usage.estimate_usage().await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manifest_entry, memory_store};

    #[test]
    fn missing_timestamp_is_stale() {
        assert!(is_stale(None, 60, Utc::now()));
    }

    #[test]
    fn staleness_uses_threshold() {
        let now = Utc::now();
        assert!(!is_stale(Some(now - TimeDelta::minutes(30)), 60, now));
        assert!(!is_stale(Some(now - TimeDelta::minutes(60)), 60, now));
        assert!(is_stale(Some(now - TimeDelta::minutes(61)), 60, now));
    }

    #[tokio::test]
    async fn sync_flags_expired_and_is_idempotent() {
        let store: Arc<dyn ChartStore> = Arc::new(memory_store().await);
        let merged_at = Utc::now() - TimeDelta::days(2);
        store
            .merge_manifest(
                &[
                    manifest_entry("LFPG-VAC-2024-01", "LFPG", merged_at + TimeDelta::days(1)),
                    manifest_entry("LFPO-VAC", "LFPO", merged_at + TimeDelta::days(30)),
                ],
                merged_at,
            )
            .await
            .expect("merge");
        let coordinator = SyncCoordinator::new(store.clone(), Arc::new(NoUsageApi));

        let now = Utc::now();
        let first = coordinator.sync(now).await.expect("first sync");
        assert_eq!(first, SyncReport { checked: 2, changed: 1, outdated: 1 });

        let second = coordinator.sync(now).await.expect("second sync");
        assert_eq!(second.changed, 0);
        assert_eq!(second.outdated, 1);

        let charts = store.load_all().await.expect("load");
        let flags: Vec<_> = charts.iter().map(|c| (c.id.as_str(), c.is_outdated)).collect();
        assert_eq!(flags, vec![("LFPG-VAC-2024-01", true), ("LFPO-VAC", false)]);
        assert_eq!(
            store.load_session().await.expect("session").last_sync_timestamp,
            Some(now)
        );
    }

    #[tokio::test]
    async fn quota_without_usage_api_is_zero() {
        let store: Arc<dyn ChartStore> = Arc::new(memory_store().await);
        let coordinator = SyncCoordinator::new(store, Arc::new(NoUsageApi));
        assert_eq!(coordinator.check_quota().await, StorageUsage { used: 0, quota: 0 });
    }

    #[tokio::test]
    async fn database_file_usage_reads_file_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("charts.db");
        tokio::fs::write(&path, vec![0u8; 4096]).await.expect("write");

        let usage = DatabaseFileUsage::new(&path, 1 << 20)
            .estimate_usage()
            .await
            .expect("usage");
        assert_eq!(usage, StorageUsage { used: 4096, quota: 1 << 20 });

        let missing = DatabaseFileUsage::new(dir.path().join("absent.db"), 1);
        assert_eq!(missing.estimate_usage().await, None);
    }
}
