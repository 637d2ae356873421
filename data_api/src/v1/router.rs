use crate::state::AppState;
use crate::v1::handlers::airports::{get_selected_airport, put_selected_airport, search_airports};
use crate::v1::handlers::cache::{clear_cache, get_quota, get_session, post_sync};
use crate::v1::handlers::charts::{
    delete_chart, download_chart, extract_chart, get_document, get_download_state, list_charts,
    patch_extracted_data,
};
use axum::Router;
use axum::routing::{delete, get, patch, post};

pub fn router() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/charts", get(list_charts))
        .route("/charts/{id}", delete(delete_chart))
        .route(
            "/charts/{id}/download",
            get(get_download_state).post(download_chart),
        )
        .route("/charts/{id}/document", get(get_document))
        .route("/charts/{id}/extract", post(extract_chart))
        .route("/charts/{id}/extracted", patch(patch_extracted_data))
        .route("/airports", get(search_airports))
        .route(
            "/session/airport",
            get(get_selected_airport).put(put_selected_airport),
        )
        .route("/session", get(get_session))
        .route("/sync", post(post_sync))
        .route("/quota", get(get_quota))
        .route("/cache", delete(clear_cache))
}
