use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use chart_catalog::{ChartFilter, ChartService, DownloadReport, DownloadState};
use serde::Deserialize;
use shared::charts::{Chart, ExtractedDataPatch};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ExtractParams {
    pub force: Option<bool>,
}

/// Lists charts matching the filter, refreshing from the manifest first when
/// the provider is reachable.
pub async fn list_charts(
    State(service): State<Arc<ChartService>>,
    Query(filter): Query<ChartFilter>,
) -> Result<Json<Vec<Chart>>, ApiError> {
    Ok(Json(service.list_charts(&filter).await?))
}

pub async fn get_download_state(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
) -> Json<DownloadState> {
    Json(service.download_state(&id))
}

/// Fetches and stores the document, then extracts it. A concurrent request
/// for the same chart returns `alreadyInFlight` without fetching again.
pub async fn download_chart(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadReport>, ApiError> {
    Ok(Json(service.download(&id).await?))
}

pub async fn get_document(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
) -> Result<([(header::HeaderName, &'static str); 1], Vec<u8>), ApiError> {
    match service.get_blob(&id).await? {
        Some(document) => Ok(([(header::CONTENT_TYPE, "application/octet-stream")], document)),
        None => Err(ApiError::NotFound(id)),
    }
}

pub async fn extract_chart(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
    Query(params): Query<ExtractParams>,
) -> Result<Json<Chart>, ApiError> {
    let force = params.force.unwrap_or(false);
    Ok(Json(service.reextract(&id, force).await?))
}

pub async fn patch_extracted_data(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
    Json(patch): Json<ExtractedDataPatch>,
) -> Result<Json<Chart>, ApiError> {
    Ok(Json(service.update_extracted_data(&id, patch).await?))
}

pub async fn delete_chart(
    State(service): State<Arc<ChartService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if service.delete_chart(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}
