use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chart_catalog::{ChartService, StorageUsage, SyncReport};
use shared::charts::SessionRecord;
use std::sync::Arc;

pub async fn post_sync(
    State(service): State<Arc<ChartService>>,
) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(service.sync().await?))
}

pub async fn get_quota(State(service): State<Arc<ChartService>>) -> Json<StorageUsage> {
    Json(service.check_quota().await)
}

pub async fn get_session(
    State(service): State<Arc<ChartService>>,
) -> Result<Json<SessionRecord>, ApiError> {
    Ok(Json(service.session().await?))
}

pub async fn clear_cache(State(service): State<Arc<ChartService>>) -> Result<StatusCode, ApiError> {
    service.clear_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1::handlers::test_support::service;
    use chart_catalog::ChartFilter;

    #[tokio::test]
    async fn sync_records_timestamp_and_clear_resets_it() {
        let service = service().await;
        service
            .list_charts(&ChartFilter::default())
            .await
            .expect("list");

        let Json(report) = post_sync(State(service.clone())).await.expect("sync");
        assert_eq!(report.checked, 1);
        assert_eq!(report.outdated, 0);

        let Json(session) = get_session(State(service.clone())).await.expect("session");
        assert!(session.last_sync_timestamp.is_some());

        let status = clear_cache(State(service.clone())).await.expect("clear");
        assert_eq!(status, StatusCode::NO_CONTENT);
        let Json(session) = get_session(State(service.clone())).await.expect("session");
        assert_eq!(session.last_sync_timestamp, None);

        let Json(usage) = get_quota(State(service)).await;
        assert_eq!(usage, StorageUsage::default());
    }
}
