use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use adscout_common::pagination::{clamp_page_size, page_count, page_offset};
use adscout_common::AdScoutError;
use adscout_pipeline::LogEntry;
use adscout_store::{ResultRow, ResultSort};

use crate::error::ApiError;
use crate::AppState;

fn default_page() -> i64 {
    1
}
fn default_page_size() -> i64 {
    20
}
fn default_sort_by() -> String {
    "monthly_visits".to_string()
}
fn default_sort_desc() -> bool {
    true
}
fn default_log_limit() -> usize {
    100
}

#[derive(Deserialize)]
pub struct ResultsQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
    #[serde(default = "default_sort_by")]
    sort_by: String,
    #[serde(default = "default_sort_desc")]
    sort_desc: bool,
}

#[derive(Serialize)]
pub struct ResultsPage {
    pub results: Vec<ResultRow>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub pages: i64,
}

/// Paginated, sortable results for one keyword.
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsPage>, ApiError> {
    let page = query.page.max(1);
    let page_size = clamp_page_size(query.page_size, 5, 100);
    let offset = page_offset(page, page_size);

    let (results, total) = state
        .store
        .results_for_keyword(
            &keyword,
            ResultSort::parse(&query.sort_by),
            query.sort_desc,
            offset,
            page_size,
        )
        .await?;

    if total == 0 {
        return Err(ApiError::NotFound(format!(
            "No results found for keyword: {keyword}"
        )));
    }

    Ok(Json(ResultsPage {
        results,
        page,
        page_size,
        total,
        pages: page_count(total, page_size),
    }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    limit: usize,
}

/// Recent in-memory log entries for a keyword.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let limit = query.limit.clamp(10, 1000);
    match state.runner.logs().recent(&keyword, limit) {
        Some(entries) => Ok(Json(entries)),
        None => Err(ApiError::NotFound(format!(
            "No logs found for keyword: {keyword}"
        ))),
    }
}

/// Delete a keyword's products, traffic records, registry entry, and logs
/// as one group. An absent keyword is not-found, never a silent success.
pub async fn delete_results(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.runner.delete(&keyword).await?;
    Ok(Json(json!({
        "status": "success",
        "deleted_products": deleted,
        "message": format!("Deleted all results for keyword: {keyword}"),
    })))
}

/// Bulk delete. Returns the subset that actually had data.
pub async fn delete_many(
    State(state): State<Arc<AppState>>,
    Json(keywords): Json<Vec<String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut deleted = Vec::new();
    for keyword in keywords {
        match state.runner.delete(&keyword).await {
            Ok(_) => deleted.push(keyword),
            Err(AdScoutError::KeywordNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(json!({
        "status": "success",
        "deleted_keywords": deleted,
    })))
}
