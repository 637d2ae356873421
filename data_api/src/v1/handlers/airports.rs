use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use chart_catalog::{AirportSummary, ChartService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct AirportQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAirport {
    pub icao: Option<String>,
}

pub async fn search_airports(
    State(service): State<Arc<ChartService>>,
    Query(query): Query<AirportQuery>,
) -> Result<Json<Vec<AirportSummary>>, ApiError> {
    let q = query.q.unwrap_or_default();
    Ok(Json(service.search_airports(&q).await?))
}

pub async fn get_selected_airport(
    State(service): State<Arc<ChartService>>,
) -> Result<Json<SelectedAirport>, ApiError> {
    let icao = service.selected_airport().await?;
    Ok(Json(SelectedAirport { icao }))
}

/// Persists the selection; a null or blank ICAO clears it.
pub async fn put_selected_airport(
    State(service): State<Arc<ChartService>>,
    Json(body): Json<SelectedAirport>,
) -> Result<Json<SelectedAirport>, ApiError> {
    let icao = service.select_airport(body.icao.as_deref()).await?;
    Ok(Json(SelectedAirport { icao }))
}
