use axum::extract::FromRef;
use chart_catalog::ChartService;
use std::sync::Arc;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: Arc<ChartService>,
}
