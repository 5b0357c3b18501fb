use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use adscout_store::DashboardStats;

use crate::error::ApiError;
use crate::AppState;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.store.dashboard_stats().await?))
}

pub async fn get_keywords(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.keywords_with_products().await?))
}
