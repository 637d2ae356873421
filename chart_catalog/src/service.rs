use crate::correction;
use crate::error::{BuildError, CatalogError};
use crate::orchestrator::{DownloadOrchestrator, DownloadState, EnqueueOutcome};
use crate::query;
use crate::source::{ChartSource, HttpChartSource};
use crate::store::{AirportSummary, ChartFilter, ChartStore, MergeReport, SqliteChartStore};
use crate::sync::{
    DatabaseFileUsage, NoUsageApi, StorageUsage, SyncCoordinator, SyncReport, UsageEstimator,
};
use chart_extractor::{ChartExtractor, TextLayer, Utf8TextLayer};
use chrono::Utc;
use serde::Serialize;
use shared::Config;
use shared::charts::{Chart, ExtractedDataPatch, ExtractionStatus, SessionRecord};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Everything persisted, as loaded at startup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub charts: Vec<Chart>,
    pub session: SessionRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub outcome: EnqueueOutcome,
    pub chart: Chart,
}

pub struct ChartService {
    store: Arc<dyn ChartStore>,
    source: Arc<dyn ChartSource>,
    orchestrator: DownloadOrchestrator,
    sync: SyncCoordinator,
    extractor: Arc<ChartExtractor>,
    text_layer: Arc<dyn TextLayer>,
}

impl ChartService {
    pub fn new(
        store: Arc<dyn ChartStore>,
        source: Arc<dyn ChartSource>,
        usage: Arc<dyn UsageEstimator>,
        extractor: ChartExtractor,
        text_layer: Arc<dyn TextLayer>,
        max_concurrent_downloads: usize,
    ) -> Self {
        Self {
            orchestrator: DownloadOrchestrator::new(
                store.clone(),
                source.clone(),
                max_concurrent_downloads,
            ),
            sync: SyncCoordinator::new(store.clone(), usage),
            store,
            source,
            extractor: Arc::new(extractor),
            text_layer,
        }
    }

    /// Wires the SQLite store, HTTP source and usage estimator from `config`.
    /// Usage is only reported when a quota is configured for a file database.
    pub fn from_config(config: &Config, pool: Pool<Sqlite>) -> Result<Self, BuildError> {
        let usage: Arc<dyn UsageEstimator> =
            match (config.cache.quota_bytes, config.database.file_path()) {
                (Some(quota), Some(path)) => Arc::new(DatabaseFileUsage::new(path, quota)),
                _ => Arc::new(NoUsageApi),
            };

        Ok(Self::new(
            Arc::new(SqliteChartStore::new(pool)),
            Arc::new(HttpChartSource::new(&config.source)?),
            usage,
            ChartExtractor::new(&config.extractor)?,
            Arc::new(Utf8TextLayer),
            config.cache.max_concurrent_downloads,
        ))
    }

    pub async fn load(&self) -> Result<CatalogSnapshot, CatalogError> {
        Ok(CatalogSnapshot {
            charts: self.store.load_all().await?,
            session: self.store.load_session().await?,
        })
    }

    #[instrument(skip(self))]
    pub async fn refresh_manifest(&self) -> Result<MergeReport, CatalogError> {
        let entries = self.source.fetch_manifest().await?;
        let report = self.store.merge_manifest(&entries, Utc::now()).await?;
        info!(name: "service.manifest.refreshed", inserted = report.inserted, updated = report.updated, "manifest refreshed");
        Ok(report)
    }

    /// Refreshes from the manifest, falling back to local state when the
    /// manifest cannot be fetched.
    pub async fn list_charts(&self, filter: &ChartFilter) -> Result<Vec<Chart>, CatalogError> {
        if let Err(e) = self.refresh_manifest().await {
            warn!(name: "service.manifest.unavailable", error = ?e, "manifest refresh failed, serving local catalog");
        }
        Ok(self.store.list_filtered(filter).await?)
    }

    pub fn download_state(&self, id: &str) -> DownloadState {
        self.orchestrator.state(id)
    }

    /// Downloads the document, then extracts it unless the chart carries a
    /// manual correction.
    #[instrument(skip(self))]
    pub async fn download(&self, id: &str) -> Result<DownloadReport, CatalogError> {
        let outcome = self.orchestrator.enqueue(id).await?;

        let chart = self.chart(id).await?;
        let chart = match outcome {
            EnqueueOutcome::Stored if chart.extraction_status != ExtractionStatus::Manual => {
                self.extract(id).await?
            }
            _ => chart,
        };

        Ok(DownloadReport { outcome, chart })
    }

    /// Runs extraction on the stored document. Refuses manual records.
    pub async fn extract(&self, id: &str) -> Result<Chart, CatalogError> {
        self.run_extraction(id, false).await
    }

    /// Re-runs extraction; `force` is required to replace a manual record.
    #[instrument(skip(self))]
    pub async fn reextract(&self, id: &str, force: bool) -> Result<Chart, CatalogError> {
        let chart = self.chart(id).await?;
        if chart.extraction_status == ExtractionStatus::Manual && !force {
            return Err(CatalogError::ManualRecord(id.to_string()));
        }
        self.run_extraction(id, force).await
    }

    /// Charts left in `Processing` by an interrupted run only need the
    /// extraction step again.
    pub async fn resume_pending_extractions(&self) -> Result<usize, CatalogError> {
        let pending: Vec<String> = self
            .store
            .load_all()
            .await?
            .into_iter()
            .filter(|chart| {
                chart.is_downloaded && chart.extraction_status == ExtractionStatus::Processing
            })
            .map(|chart| chart.id)
            .collect();

        let mut resumed = 0;
        for id in pending {
            match self.extract(&id).await {
                Ok(_) => resumed += 1,
                Err(e) => {
                    warn!(name: "service.extraction.resume_failed", id = %id, error = ?e, "could not resume extraction");
                }
            }
        }
        if resumed > 0 {
            info!(name: "service.extraction.resumed", count = resumed, "resumed interrupted extractions");
        }
        Ok(resumed)
    }

    async fn run_extraction(&self, id: &str, overwrite_manual: bool) -> Result<Chart, CatalogError> {
        let document = self
            .store
            .get_blob(id, Utc::now())
            .await?
            .ok_or_else(|| CatalogError::NotDownloaded(id.to_string()))?;

        let started = if overwrite_manual {
            self.store
                .record_extraction(id, ExtractionStatus::Processing, None, true)
                .await?
        } else {
            self.store.begin_extraction(id).await?
        };
        if !started {
            return Err(CatalogError::ManualRecord(id.to_string()));
        }

        let extractor = self.extractor.clone();
        let layer = self.text_layer.clone();
        let result = tokio::task::spawn_blocking(move || {
            extractor.extract_document(layer.as_ref(), &document)
        })
        .await;

        // From here on a concurrent manual correction wins over this result.
        let (status, data, error) = match result {
            Ok(Ok(data)) => (ExtractionStatus::Completed, Some(data), None),
            Ok(Err(e)) => (ExtractionStatus::Failed, None, Some(CatalogError::from(e))),
            Err(join) => (ExtractionStatus::Failed, None, Some(CatalogError::from(join))),
        };

        let written = self
            .store
            .record_extraction(id, status, data.as_ref(), false)
            .await?;
        if !written {
            warn!(name: "service.extraction.superseded", id, "extraction result discarded, chart was corrected meanwhile");
        }

        if let Some(e) = error {
            warn!(name: "service.extraction.failed", id, error = ?e, "chart extraction failed");
            return Err(e);
        }
        info!(name: "service.extraction.completed", id, "chart extraction completed");
        self.chart(id).await
    }

    pub async fn update_extracted_data(
        &self,
        id: &str,
        patch: ExtractedDataPatch,
    ) -> Result<Chart, CatalogError> {
        correction::update_extracted_data(self.store.as_ref(), id, patch).await
    }

    #[instrument(skip(self))]
    pub async fn delete_chart(&self, id: &str) -> Result<bool, CatalogError> {
        let deleted = self.store.delete(id).await?;
        self.orchestrator.forget(id);
        Ok(deleted)
    }

    pub async fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>, CatalogError> {
        Ok(self.store.get_blob(id, Utc::now()).await?)
    }

    pub async fn sync(&self) -> Result<SyncReport, CatalogError> {
        self.sync.sync(Utc::now()).await
    }

    pub async fn check_quota(&self) -> StorageUsage {
        self.sync.check_quota().await
    }

    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<(), CatalogError> {
        self.store.clear().await?;
        self.orchestrator.forget_all();
        info!(name: "service.cache.cleared", "chart cache cleared");
        Ok(())
    }

    pub async fn search_airports(&self, query: &str) -> Result<Vec<AirportSummary>, CatalogError> {
        query::search_airports(self.store.as_ref(), query).await
    }

    pub async fn select_airport(&self, icao: Option<&str>) -> Result<Option<String>, CatalogError> {
        query::select_airport(self.store.as_ref(), icao).await
    }

    pub async fn selected_airport(&self) -> Result<Option<String>, CatalogError> {
        query::selected_airport(self.store.as_ref()).await
    }

    pub async fn session(&self) -> Result<SessionRecord, CatalogError> {
        Ok(self.store.load_session().await?)
    }

    async fn chart(&self, id: &str) -> Result<Chart, CatalogError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CatalogError::UnknownChart(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSource, manifest_entry, memory_store};
    use chrono::TimeDelta;
    use shared::ExtractorConfig;
    use shared::charts::{FrequencyRole, Surface};

    const VAC_TEXT: &[u8] = b"RWY 09L 118.250 TWR ... 650 x 30 ASPH";

    async fn service(source: FakeSource) -> (ChartService, Arc<FakeSource>) {
        let source = Arc::new(source);
        let service = ChartService::new(
            Arc::new(memory_store().await),
            source.clone(),
            Arc::new(NoUsageApi),
            ChartExtractor::new(&ExtractorConfig::default()).expect("extractor"),
            Arc::new(Utf8TextLayer),
            2,
        );
        (service, source)
    }

    fn manifest() -> Vec<shared::charts::ManifestEntry> {
        vec![manifest_entry("LFXX-VAC", "LFXX", Utc::now() + TimeDelta::days(10))]
    }

    #[tokio::test]
    async fn download_stores_then_extracts() {
        let source = FakeSource::with_document("LFXX-VAC", VAC_TEXT).with_manifest(manifest());
        let (service, _) = service(source).await;
        service.refresh_manifest().await.expect("manifest");

        let report = service.download("LFXX-VAC").await.expect("download");
        assert_eq!(report.outcome, EnqueueOutcome::Stored);
        assert!(report.chart.is_downloaded);
        assert_eq!(report.chart.extraction_status, ExtractionStatus::Completed);

        let data = report.chart.extracted_data.expect("extracted data");
        assert_eq!(data.runways[0].identifier, "09L");
        assert_eq!(data.runways[0].surface, Surface::Asphalt);
        assert_eq!(data.frequencies[0].role, FrequencyRole::Tower);
    }

    #[tokio::test]
    async fn unreadable_document_marks_extraction_failed() {
        let source = FakeSource::with_document("LFXX-VAC", b"   ").with_manifest(manifest());
        let (service, _) = service(source).await;
        service.refresh_manifest().await.expect("manifest");

        let err = service.download("LFXX-VAC").await.expect_err("extraction fails");
        assert!(err.is_retryable_extraction());

        let chart = service.chart("LFXX-VAC").await.expect("chart");
        assert!(chart.is_downloaded);
        assert_eq!(chart.extraction_status, ExtractionStatus::Failed);
    }

    #[tokio::test]
    async fn manual_record_needs_force_to_reextract() {
        let source = FakeSource::with_document("LFXX-VAC", VAC_TEXT).with_manifest(manifest());
        let (service, _) = service(source).await;
        service.refresh_manifest().await.expect("manifest");
        service.download("LFXX-VAC").await.expect("download");
        service
            .update_extracted_data("LFXX-VAC", ExtractedDataPatch::default())
            .await
            .expect("correct");

        let err = service.reextract("LFXX-VAC", false).await.expect_err("manual");
        assert!(matches!(err, CatalogError::ManualRecord(_)));

        let redownload = service.download("LFXX-VAC").await.expect("download again");
        assert_eq!(redownload.chart.extraction_status, ExtractionStatus::Manual);

        let forced = service.reextract("LFXX-VAC", true).await.expect("forced");
        assert_eq!(forced.extraction_status, ExtractionStatus::Completed);
    }

    #[tokio::test]
    async fn reextract_without_blob_is_not_downloaded() {
        let (service, _) = service(FakeSource::default().with_manifest(manifest())).await;
        service.refresh_manifest().await.expect("manifest");

        let err = service.reextract("LFXX-VAC", false).await.expect_err("no blob");
        assert!(matches!(err, CatalogError::NotDownloaded(_)));
    }

    #[tokio::test]
    async fn list_falls_back_to_local_state() {
        let (service, source) = service(FakeSource::default().with_manifest(manifest())).await;
        assert_eq!(
            service.list_charts(&ChartFilter::default()).await.expect("list").len(),
            1
        );

        source.fail_manifest();
        let charts = service.list_charts(&ChartFilter::default()).await.expect("list");
        assert_eq!(charts.len(), 1);
    }

    #[tokio::test]
    async fn interrupted_extraction_resumes_from_blob() {
        let (service, _) = service(FakeSource::default().with_manifest(manifest())).await;
        service.refresh_manifest().await.expect("manifest");
        let now = Utc::now();
        service.store.put_blob("LFXX-VAC", VAC_TEXT, now).await.expect("blob");
        service.store.mark_downloaded("LFXX-VAC", now).await.expect("mark");
        service.store.begin_extraction("LFXX-VAC").await.expect("begin");

        assert_eq!(service.resume_pending_extractions().await.expect("resume"), 1);
        let chart = service.chart("LFXX-VAC").await.expect("chart");
        assert_eq!(chart.extraction_status, ExtractionStatus::Completed);
    }

    #[tokio::test]
    async fn clear_cache_forgets_download_outcomes() {
        let source = FakeSource::with_document("LFXX-VAC", VAC_TEXT).with_manifest(manifest());
        let (service, _) = service(source).await;
        service.refresh_manifest().await.expect("manifest");
        service.download("LFXX-VAC").await.expect("download");
        assert_eq!(service.download_state("LFXX-VAC"), DownloadState::Stored);

        service.clear_cache().await.expect("clear");
        assert_eq!(service.download_state("LFXX-VAC"), DownloadState::NotQueued);
        assert!(service.store.get("LFXX-VAC").await.expect("get").is_none());
    }
}
