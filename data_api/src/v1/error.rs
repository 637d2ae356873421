use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chart_catalog::CatalogError;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("chart {0} not found")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(id) => {
                ErrorMessage::from((StatusCode::NOT_FOUND, format!("chart {id} not found")))
                    .into_response()
            }
            ApiError::Catalog(e) => match e {
                CatalogError::UnknownChart(id) => {
                    ErrorMessage::from((StatusCode::NOT_FOUND, format!("chart {id} not found")))
                        .into_response()
                }
                CatalogError::NotDownloaded(id) => ErrorMessage::from((
                    StatusCode::CONFLICT,
                    format!("chart {id} has not been downloaded"),
                ))
                .into_response(),
                CatalogError::ManualRecord(id) => ErrorMessage::from((
                    StatusCode::CONFLICT,
                    format!("chart {id} carries manual corrections, pass force=true to replace them"),
                ))
                .into_response(),
                CatalogError::Fetch(e) => {
                    warn!(error = ?e, "chart provider request failed");
                    ErrorMessage::from((StatusCode::BAD_GATEWAY, "chart provider request failed"))
                        .into_response()
                }
                CatalogError::Extraction(e) => {
                    warn!(error = ?e, "chart extraction failed");
                    ErrorMessage::from((
                        StatusCode::UNPROCESSABLE_ENTITY,
                        format!("chart document could not be read: {e}"),
                    ))
                    .into_response()
                }
                CatalogError::Storage(e) if e.is_storage_full() => {
                    warn!(error = ?e, "chart storage is full");
                    ErrorMessage::from((StatusCode::INSUFFICIENT_STORAGE, "chart storage is full"))
                        .into_response()
                }
                CatalogError::QueueClosed(e) => {
                    warn!(error = ?e, "download queue closed");
                    ErrorMessage::from((StatusCode::SERVICE_UNAVAILABLE, "download queue closed"))
                        .into_response()
                }
                e => {
                    warn!(error = ?e, "internal catalog error");
                    ErrorMessage::from((StatusCode::INTERNAL_SERVER_ERROR, "internal server error"))
                        .into_response()
                }
            },
        }
    }
}

fn serialize_status<S>(value: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(value.as_u16())
}

impl From<(StatusCode, String)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, String)) -> Self {
        Self {
            status_code,
            message,
        }
    }
}

impl From<(StatusCode, &str)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, &str)) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorMessage {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
