use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use adscout_common::AdScoutError;
use adscout_store::StoreError;

pub enum ApiError {
    NotFound(String),
    Validation(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Validation(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Internal(e) => {
                // Clients get a correlation id, not the internal message.
                let correlation_id = Uuid::new_v4();
                error!(correlation_id = %correlation_id, error = %e, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "detail": "Internal Server Error",
                        "correlation_id": correlation_id,
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl From<AdScoutError> for ApiError {
    fn from(err: AdScoutError) -> Self {
        match err {
            AdScoutError::Validation(msg) => ApiError::Validation(msg),
            AdScoutError::KeywordNotFound(keyword) => {
                ApiError::NotFound(format!("No data found for keyword: {keyword}"))
            }
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}
