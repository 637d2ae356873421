use crate::error::{CatalogError, StoreError};
use crate::source::ChartSource;
use crate::store::ChartStore;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadState {
    NotQueued,
    /// Waiting for a download permit.
    Queued,
    Fetching,
    Stored,
    FetchFailed,
}

impl DownloadState {
    fn is_in_flight(self) -> bool {
        matches!(self, DownloadState::Queued | DownloadState::Fetching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnqueueOutcome {
    Stored,
    /// Another caller is already downloading this chart; nothing was fetched.
    AlreadyInFlight,
}

/// Fetches chart documents, at most one fetch per id at any time.
pub struct DownloadOrchestrator {
    store: Arc<dyn ChartStore>,
    source: Arc<dyn ChartSource>,
    permits: Semaphore,
    states: Mutex<HashMap<String, DownloadState>>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<dyn ChartStore>,
        source: Arc<dyn ChartSource>,
        max_concurrent_downloads: usize,
    ) -> Self {
        Self {
            store,
            source,
            permits: Semaphore::new(max_concurrent_downloads.max(1)),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, id: &str) -> DownloadState {
        self.states
            .lock()
            .get(id)
            .copied()
            .unwrap_or(DownloadState::NotQueued)
    }

    /// Drops the remembered outcome for `id` unless a download is running.
    pub fn forget(&self, id: &str) {
        let mut states = self.states.lock();
        if states.get(id).is_some_and(|state| !state.is_in_flight()) {
            states.remove(id);
        }
    }

    /// Drops every remembered outcome, keeping downloads that are running.
    pub fn forget_all(&self) {
        self.states.lock().retain(|_, state| state.is_in_flight());
    }

    /// Downloads `id` and stores it: blob first, then the downloaded flag.
    ///
    /// Dropping the returned future before it resolves leaves the chart
    /// exactly as a failed fetch would.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, id: &str) -> Result<EnqueueOutcome, CatalogError> {
        if self.store.get(id).await?.is_none() {
            return Err(CatalogError::UnknownChart(id.to_string()));
        }

        let Some(guard) = self.claim(id) else {
            debug!(name: "orchestrator.enqueue.deduplicated", "download already in flight");
            return Ok(EnqueueOutcome::AlreadyInFlight);
        };

        let _permit = self.permits.acquire().await?;
        guard.set(DownloadState::Fetching);

        let bytes = match self.source.fetch_document(id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(name: "orchestrator.fetch.failed", error = ?e, "chart fetch failed");
                guard.finish(DownloadState::FetchFailed);
                return Err(e.into());
            }
        };

        // The chart may have been deleted while the fetch was running.
        if self.store.get(id).await?.is_none() {
            guard.finish(DownloadState::FetchFailed);
            return Err(CatalogError::UnknownChart(id.to_string()));
        }

        let now = Utc::now();
        match self.store.put_blob(id, &bytes, now).await {
            Ok(()) => {}
            Err(StoreError::Db(sqlx::Error::Database(e))) if e.is_foreign_key_violation() => {
                guard.finish(DownloadState::FetchFailed);
                return Err(CatalogError::UnknownChart(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        if !self.store.mark_downloaded(id, now).await? {
            // Deleted between the blob write and the flag; the blob cascaded away.
            guard.finish(DownloadState::FetchFailed);
            return Err(CatalogError::UnknownChart(id.to_string()));
        }

        guard.finish(DownloadState::Stored);
        info!(name: "orchestrator.download.stored", size = bytes.len(), "chart stored");
        Ok(EnqueueOutcome::Stored)
    }

    /// Check-then-insert under a single lock; no await in between.
    fn claim(&self, id: &str) -> Option<InFlightGuard<'_>> {
        let mut states = self.states.lock();
        if states.get(id).is_some_and(|state| state.is_in_flight()) {
            return None;
        }
        states.insert(id.to_string(), DownloadState::Queued);
        Some(InFlightGuard {
            states: &self.states,
            id: id.to_string(),
            finished: false,
        })
    }
}

/// Marks the download failed if dropped before `finish`.
struct InFlightGuard<'a> {
    states: &'a Mutex<HashMap<String, DownloadState>>,
    id: String,
    finished: bool,
}

impl InFlightGuard<'_> {
    fn set(&self, state: DownloadState) {
        self.states.lock().insert(self.id.clone(), state);
    }

    fn finish(mut self, state: DownloadState) {
        self.set(state);
        self.finished = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.states
                .lock()
                .insert(self.id.clone(), DownloadState::FetchFailed);
        }
    }
}
