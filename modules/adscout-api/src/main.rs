use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adscout_common::Config;
use adscout_pipeline::{discovery::load_blacklist, MetricsCollector, PipelineRunner};
use adscout_store::ProductStore;
use apify_client::ApifyClient;
use similarweb_client::SimilarWebClient;

mod error;
mod rest;

pub struct AppState {
    pub runner: Arc<PipelineRunner>,
    pub store: ProductStore,
    pub metrics: Arc<MetricsCollector>,
}

/// Record method/path/status/latency for every request.
async fn track_metrics(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    state.metrics.record_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adscout=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = ProductStore::new(pool);
    store.migrate().await?;

    let metrics = Arc::new(MetricsCollector::new());
    let blacklist = load_blacklist(config.blacklist_file.as_deref());

    let runner = Arc::new(PipelineRunner::new(
        Arc::new(store.clone()),
        Arc::new(ApifyClient::new(config.apify_token.clone())),
        Arc::new(SimilarWebClient::new(config.scraper_api_key.clone())),
        metrics.clone(),
        blacklist,
    ));

    let state = Arc::new(AppState {
        runner,
        store,
        metrics,
    });

    let app = Router::new()
        // Pipeline
        .route("/pipeline/run", post(rest::pipeline::run_pipeline))
        .route("/pipeline/status/{keyword}", get(rest::pipeline::get_status))
        // Results and logs
        .route(
            "/results/{keyword}",
            get(rest::results::get_results).delete(rest::results::delete_results),
        )
        .route("/results", delete(rest::results::delete_many))
        .route("/logs/{keyword}", get(rest::results::get_logs))
        // Live stream
        .route("/events/{keyword}", get(rest::stream::event_stream))
        // Dashboard
        .route("/dashboard/stats", get(rest::dashboard::get_stats))
        .route("/dashboard/keywords", get(rest::dashboard::get_keywords))
        // Monitoring
        .route("/metrics", get(rest::metrics))
        .route("/health", get(rest::health))
        .route("/", get(rest::root))
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("AdScout API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
