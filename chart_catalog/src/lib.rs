//! Chart catalog: durable chart metadata and documents, the download
//! pipeline, expiry sync and airport queries, behind [`ChartService`].

pub mod correction;
pub mod error;
pub mod orchestrator;
pub mod query;
pub mod service;
pub mod source;
pub mod store;
pub mod sync;

pub use error::{BuildError, CatalogError, FetchError, StoreError};
pub use orchestrator::{DownloadOrchestrator, DownloadState, EnqueueOutcome};
pub use service::{CatalogSnapshot, ChartService, DownloadReport};
pub use source::{ChartSource, HttpChartSource};
pub use store::{AirportSummary, ChartFilter, ChartStore, MergeReport, SqliteChartStore};
pub use sync::{
    DatabaseFileUsage, NoUsageApi, StorageUsage, SyncCoordinator, SyncReport, UsageEstimator,
    is_stale,
};
