use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;

use adscout_pipeline::{RunRequest, RunSnapshot};

use crate::error::ApiError;
use crate::AppState;

/// Submit a keyword for a pipeline run. Echoes the existing snapshot when a
/// run is already active for the keyword.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunSnapshot>, ApiError> {
    let run = state.runner.submit(request).await?;
    Ok(Json(run))
}

/// Current run snapshot, resident or reconstructed from storage.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    Ok(Json(state.runner.get_status(&keyword).await?))
}
