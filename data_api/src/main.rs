mod state;
mod v1;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use chart_catalog::ChartService;
use shared::{init_tracing, initialize_db, load_config};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let config = load_config()?;
    let pool = initialize_db(&config.database, true).await?;
    let service = Arc::new(ChartService::from_config(&config, pool)?);
    let state = AppState { service };

    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/v1", v1::router().with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listen_addr = config.api.listen_addr;
    info!(name: "api.starting", listen_addr = %listen_addr, "starting server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shared::shutdown_listener(None))
        .await?;

    Ok(())
}
