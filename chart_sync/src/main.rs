#![warn(clippy::pedantic)]
mod error;

use crate::error::MainError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chart_catalog::{ChartService, is_stale};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use shared::error::InitializationError;
use shared::{init_tracing, initialize_db, load_config, shutdown_listener};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
struct SyncState {
    service: Arc<ChartService>,
    manifest_refresh_minutes: i64,
    stale_after: TimeDelta,
    last_attempted_sync: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_successful_sync: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_manifest_refresh: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl SyncState {
    fn new(service: Arc<ChartService>, interval_seconds: u64, manifest_refresh_minutes: i64) -> Self {
        // Healthy while at most two consecutive cycles have been missed.
        let stale_after = TimeDelta::from_std(Duration::from_secs(interval_seconds.saturating_mul(3)))
            .unwrap_or(TimeDelta::MAX);

        Self {
            service,
            manifest_refresh_minutes,
            stale_after,
            last_attempted_sync: Arc::new(RwLock::new(None)),
            last_successful_sync: Arc::new(RwLock::new(None)),
            last_manifest_refresh: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    init_tracing()?;

    let config = load_config().map_err(InitializationError::from)?;
    info!(name: "config.loaded", config = ?config, "config loaded");

    let db_pool = initialize_db(&config.database, true).await?;
    let service = Arc::new(ChartService::from_config(&config, db_pool)?);

    let snapshot = service.load().await?;
    info!(
        name: "catalog.loaded",
        charts = snapshot.charts.len(),
        selected_airport = ?snapshot.session.selected_airport,
        last_sync = ?snapshot.session.last_sync_timestamp,
        "catalog loaded"
    );
    service.resume_pending_extractions().await?;

    let state = SyncState::new(
        service,
        config.sync.interval_seconds,
        config.sync.manifest_refresh_minutes,
    );

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let mut signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let mut axum_handle = tokio::spawn(run_health_server(
        state.clone(),
        config.health.listen_addr.clone(),
        shutdown_token.clone(),
    ));

    let mut sync_handle = tokio::spawn(sync_loop(
        state,
        config.sync.interval_seconds,
        shutdown_token.clone(),
    ));

    let mut first_err: Option<MainError> = None;
    let mut axum_done = false;
    let mut sync_done = false;

    tokio::select! {
        res = &mut axum_handle => {
            info!(name: "axum.completed", "axum task completed first, propagating cancellation token to other tasks");
            axum_done = true;
            shutdown_token.cancel();
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(name: "axum.completed", error = ?e, "axum task completed due to error");
                    first_err.get_or_insert(e.into());
                }
                Err(join) => {
                    warn!(name: "axum.completed", error = ?join, "axum task completed due to error");
                    first_err.get_or_insert(join.into());
                }
            }
        }
        res = &mut sync_handle => {
            info!(name: "sync.completed", "sync task completed first, propagating cancellation token to other tasks");
            sync_done = true;
            shutdown_token.cancel();
            if let Err(join) = res {
                warn!(name: "sync.completed", error = ?join, "sync task completed due to error");
                first_err.get_or_insert(join.into());
            }
        }
        res = &mut signal_handle => {
            info!(name: "listener.completed", "SIGINT/SIGTERM listener task completed first, propagating cancellation token to other tasks");
            shutdown_token.cancel();
            if let Err(join) = res {
                warn!(name: "listener.completed", error = ?join, "error with SIGINT/SIGTERM listener task");
                first_err.get_or_insert(join.into());
            }
        }
    }

    if !axum_done {
        info!(name: "axum.completion.awaiting", "awaiting completion of axum task");
        match axum_handle.await {
            Ok(Ok(())) => {
                info!(name: "axum.completed", "axum task completed successfully");
            }
            Ok(Err(e)) => {
                info!(name: "axum.completed", error = ?e, "axum task completed with error");
                first_err.get_or_insert(e.into());
            }
            Err(join) => {
                info!(name: "axum.completed", error = ?join, "axum task completed with error");
                first_err.get_or_insert(join.into());
            }
        }
    }
    if !sync_done {
        info!(name: "sync.completion.awaiting", "awaiting completion of sync task");
        if let Err(join) = sync_handle.await {
            info!(name: "sync.completed", error = ?join, "sync task completed with error");
            first_err.get_or_insert(join.into());
        } else {
            info!(name: "sync.completed", "sync task completed successfully");
        }
    }

    if let Some(err) = first_err {
        Err(err)
    } else {
        Ok(())
    }
}

async fn sync_loop(state: SyncState, interval_seconds: u64, shutdown: CancellationToken) {
    info!(name: "sync.loop.initialized", "initialized chart sync loop");
    let mut initial_loop = true;
    loop {
        if initial_loop {
            initial_loop = false;
        } else {
            tokio::select! {
                () = sleep(Duration::from_secs(interval_seconds)) => {},
                () = shutdown.cancelled() => {
                    info!(name: "sync_loop.shutdown.requested", "shutdown requested, exiting sync loop");
                    break;
                }
            }
        }

        run_sync_cycle(&state, Utc::now()).await;

        // If shutdown was requested during the cycle, break after finishing it.
        if shutdown.is_cancelled() {
            info!(name: "sync_loop.shutdown.requested", "shutdown requested, sync loop exiting after current iteration");
            break;
        }
    }
}

/// Refreshes the manifest when it is older than the configured threshold,
/// then recomputes expiry flags.
#[instrument(skip(state))]
async fn run_sync_cycle(state: &SyncState, now: DateTime<Utc>) {
    *state.last_attempted_sync.write() = Some(now);

    let last_refresh = *state.last_manifest_refresh.read();
    if is_stale(last_refresh, state.manifest_refresh_minutes, now) {
        match state.service.refresh_manifest().await {
            Ok(report) => {
                *state.last_manifest_refresh.write() = Some(now);
                debug!(name: "sync_loop.manifest.refreshed", inserted = report.inserted, updated = report.updated, "manifest refreshed");
            }
            Err(e) => {
                warn!(name: "sync_loop.manifest.refreshed", error = ?e, "manifest refresh failed, keeping local catalog");
                *state.last_error.write() = Some(format!("{e:?}"));
            }
        }
    }

    match state.service.sync().await {
        Ok(report) => {
            *state.last_successful_sync.write() = Some(now);
            debug!(name: "sync_loop.catalog.synced", changed = report.changed, outdated = report.outdated, "catalog synced");
        }
        Err(e) => {
            warn!(name: "sync_loop.catalog.synced", error = ?e, "catalog sync failed");
            *state.last_error.write() = Some(format!("{e:?}"));
        }
    }
}

async fn run_health_server(
    state: SyncState,
    listen_addr: String,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!(name: "axum.initialized", listen_addr = %listen_addr, "starting axum health server");
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(state);
    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn health_check(State(state): State<SyncState>) -> impl IntoResponse {
    let usage = state.service.check_quota().await;
    let (status, message) = health_status(&state, Utc::now());
    (
        status,
        format!("{message}. Storage used: {} of {} bytes", usage.used, usage.quota),
    )
}

fn health_status(state: &SyncState, now: DateTime<Utc>) -> (StatusCode, String) {
    let last_attempted_sync = *state.last_attempted_sync.read();
    let last_successful_sync = *state.last_successful_sync.read();
    let last_error = state
        .last_error
        .read()
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    match (last_attempted_sync, last_successful_sync) {
        (None, _) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "No attempted or successful catalog syncs".to_string(),
        ),
        (Some(attempted), None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Catalog has not been successfully synced. Last attempted sync: {attempted}. Last error: {last_error}"
            ),
        ),
        (Some(attempted), Some(successful)) if now - successful > state.stale_after => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Catalog not synced recently. Last successful sync: {successful}. Last attempted sync: {attempted}. Last error: {last_error}"
            ),
        ),
        (Some(_), Some(successful)) => (
            StatusCode::OK,
            format!("Catalog last successfully synced: {successful}"),
        ),
    }
}
