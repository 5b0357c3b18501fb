pub mod dashboard;
pub mod pipeline;
pub mod results;
pub mod stream;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json};

use crate::error::ApiError;
use crate::AppState;

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let store_stats = state.store.stats().await?;
    let active_runs = state.runner.active_runs().await;
    let body = state.metrics.render(active_runs, &store_stats);
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Liveness check including a storage ping.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "service": "adscout-api",
        }))
        .into_response(),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "database": e.to_string(),
            })),
        )
            .into_response(),
    }
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "AdScout API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
