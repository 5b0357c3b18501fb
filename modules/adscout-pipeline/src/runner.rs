//! PipelineRunner — drives the two-stage workflow for one keyword.
//!
//! Each accepted submission becomes a fire-and-forget tokio task. The task
//! body catches every error: a failed run is recorded in the registry and
//! broadcast as an error event, never propagated to the spawner.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use adscout_common::AdScoutError;

use crate::bus::EventBus;
use crate::config::RunRequest;
use crate::discovery::run_discovery;
use crate::events::EventEmitter;
use crate::metrics::MetricsCollector;
use crate::registry::{RunRegistry, RunSnapshot, RunStatus};
use crate::run_log::RunLogStore;
use crate::traits::{AdSource, ProductRepository, TrafficLookup};

/// Enrichment is capped per run to protect the traffic API and keep run
/// latency bounded.
const ENRICHMENT_LIMIT: usize = 10;

/// Window for re-querying just-persisted products as the enrichment subset.
const RECENT_WINDOW_MINUTES: i64 = 5;

pub struct PipelineRunner {
    registry: RunRegistry,
    bus: Arc<EventBus>,
    logs: RunLogStore,
    metrics: Arc<MetricsCollector>,
    repo: Arc<dyn ProductRepository>,
    ads: Arc<dyn AdSource>,
    traffic: Arc<dyn TrafficLookup>,
    blacklist: HashSet<String>,
}

impl PipelineRunner {
    pub fn new(
        repo: Arc<dyn ProductRepository>,
        ads: Arc<dyn AdSource>,
        traffic: Arc<dyn TrafficLookup>,
        metrics: Arc<MetricsCollector>,
        blacklist: HashSet<String>,
    ) -> Self {
        Self {
            registry: RunRegistry::new(),
            bus: Arc::new(EventBus::new()),
            logs: RunLogStore::new(),
            metrics,
            repo,
            ads,
            traffic,
            blacklist,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn logs(&self) -> &RunLogStore {
        &self.logs
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub async fn active_runs(&self) -> usize {
        self.registry.active_count().await
    }

    /// Accept a submission. Idempotent per keyword: while a run is active the
    /// existing snapshot is echoed and no new task is spawned.
    pub async fn submit(self: &Arc<Self>, mut request: RunRequest) -> Result<RunSnapshot, AdScoutError> {
        request.validate().map_err(AdScoutError::Validation)?;
        request.keyword = request.keyword.trim().to_string();

        let (snapshot, started) = self.registry.begin(&request.keyword).await;
        if started {
            info!(keyword = request.keyword.as_str(), "Pipeline run accepted");
            let runner = Arc::clone(self);
            tokio::spawn(async move { runner.run(request).await });
        } else {
            info!(
                keyword = request.keyword.as_str(),
                "Run already active, echoing existing snapshot"
            );
        }
        Ok(snapshot)
    }

    /// Run state for a keyword: the resident snapshot, or one reconstructed
    /// from persisted products (and cached back into the registry).
    /// A keyword that is neither resident nor persisted is not-found.
    pub async fn get_status(&self, keyword: &str) -> Result<RunSnapshot, AdScoutError> {
        if let Some(run) = self.registry.get(keyword).await {
            return Ok(run);
        }

        let Some(overview) = self.repo.keyword_overview(keyword).await? else {
            return Err(AdScoutError::KeywordNotFound(keyword.to_string()));
        };

        let mut run = RunSnapshot::new(keyword);
        run.status = RunStatus::Completed;
        run.step1_products = overview.products as u32;
        run.step2_enriched = overview.enriched as u32;
        run.started_at = overview.first_discovered;
        run.completed_at = overview.last_discovered;
        run.finalize_duration();

        self.registry.insert(run.clone()).await;
        Ok(run)
    }

    /// Delete everything for a keyword as one logical group: persisted rows,
    /// the registry entry, the bus snapshot, and the log buffer.
    /// Returns the deleted product count; a keyword with nothing persisted is
    /// not-found, never a silent success.
    pub async fn delete(&self, keyword: &str) -> Result<u64, AdScoutError> {
        let Some(deleted) = self.repo.delete_keyword(keyword).await? else {
            return Err(AdScoutError::KeywordNotFound(keyword.to_string()));
        };

        self.registry.remove(keyword).await;
        self.bus.clear_snapshot(keyword).await;
        self.logs.clear(keyword);
        Ok(deleted)
    }

    // --- background task body ---

    async fn run(self: Arc<Self>, request: RunRequest) {
        let keyword = request.keyword.clone();
        let emitter = EventEmitter::new(self.bus.clone(), keyword.clone());
        let mut keyword_id: Option<i64> = None;

        match self.run_inner(&request, &emitter, &mut keyword_id).await {
            Ok(()) => self.metrics.record_run(true),
            Err(e) => {
                self.metrics.record_run(false);
                let message = format!("Pipeline failed: {e:#}");
                error!(keyword = keyword.as_str(), error = %message, "Pipeline run failed");

                emitter.error(&message, None).await;
                self.registry
                    .update(&keyword, |run| {
                        run.status = RunStatus::Failed;
                        run.errors.push(message.clone());
                        run.completed_at = Some(Utc::now());
                        run.finalize_duration();
                    })
                    .await;
                self.logs.append(&keyword, "error", &message);

                if let Some(id) = keyword_id {
                    if let Err(store_err) = self.repo.fail_keyword(id, &message).await {
                        warn!(keyword = keyword.as_str(), error = %store_err, "Failed to mark keyword failed");
                    }
                }
            }
        }
    }

    async fn run_inner(
        &self,
        request: &RunRequest,
        emitter: &EventEmitter,
        resolved_keyword_id: &mut Option<i64>,
    ) -> Result<()> {
        let keyword = request.keyword.as_str();

        self.registry
            .update(keyword, |run| run.started_at = Some(Utc::now()))
            .await;
        emitter.start(request).await;
        self.logs
            .append(keyword, "info", format!("Starting pipeline for keyword: {keyword}"));
        info!(keyword, max_ads = request.max_ads, "Pipeline starting");

        let (keyword_id, created) = self.repo.find_or_create_keyword(keyword).await?;
        *resolved_keyword_id = Some(keyword_id);
        let verb = if created { "Created new" } else { "Using existing" };
        emitter
            .log("info", format!("{verb} keyword record: {keyword}, id={keyword_id}"))
            .await;
        self.repo.mark_keyword_processing(keyword_id).await?;

        // Step 1: discovery
        emitter
            .step_start(
                1,
                "Facebook Ad Scraping",
                format!("Scrape ads for keyword '{keyword}' via Apify"),
            )
            .await;
        let step1_started = Instant::now();

        let discovery = match run_discovery(
            &self.ads,
            &self.repo,
            &self.blacklist,
            keyword_id,
            request,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                emitter.error(&format!("Step 1 failed: {e:#}"), Some(1)).await;
                return Err(e);
            }
        };

        let step1_duration = step1_started.elapsed().as_secs_f64();
        let discovered = discovery.products.len() as u32;
        self.registry
            .update(keyword, |run| {
                run.step1_products = discovered;
                run.status = RunStatus::CompletedStep1;
            })
            .await;
        emitter
            .step_complete(
                1,
                json!({
                    "products_found": discovered,
                    "duration_seconds": round1(step1_duration),
                }),
            )
            .await;
        self.logs.append(
            keyword,
            "info",
            format!("Step 1 discovered {discovered} products in {step1_duration:.1}s"),
        );

        if discovery.products.is_empty() {
            emitter.log("warning", "No products found. Pipeline complete.").await;
            let run = self.finalize_completed(keyword).await;
            let duration = run.and_then(|r| r.duration_seconds);
            self.repo
                .complete_keyword(
                    keyword_id,
                    discovery.ads_fetched as i64,
                    0,
                    duration.map(|d| d as i64),
                )
                .await?;
            emitter
                .complete(json!({ "products_discovered": 0, "traffic_enriched": 0 }))
                .await;
            return Ok(());
        }

        // Select the enrichment subset from what was just persisted.
        let cutoff = Utc::now() - chrono::Duration::minutes(RECENT_WINDOW_MINUTES);
        let recent = self
            .repo
            .recent_products(cutoff, request.max_ads as i64)
            .await?;
        emitter
            .log("info", format!("Found {} recent products for enrichment", recent.len()))
            .await;

        let subset: Vec<_> = recent.iter().take(ENRICHMENT_LIMIT).collect();
        let total = subset.len() as u32;

        // Step 2: enrichment, sequential to respect the traffic API's limits.
        self.registry
            .update(keyword, |run| run.status = RunStatus::RunningStep2)
            .await;
        emitter
            .step_start(
                2,
                "Traffic Data Enrichment",
                format!("Enrich {total} domains with traffic data"),
            )
            .await;
        let step2_started = Instant::now();
        let mut enriched = 0u32;

        for (index, product) in subset.iter().enumerate() {
            let domain = product.brand_domain.as_str();
            emitter
                .step_progress(2, index as u32, total, Some(domain.to_string()))
                .await;

            match self.traffic.lookup(domain).await {
                Ok(estimate) => {
                    if let Err(e) = self
                        .repo
                        .record_traffic(product.id, estimate.monthly_visits, &estimate.source)
                        .await
                    {
                        self.record_domain_failure(
                            keyword,
                            emitter,
                            format!("Persisting traffic for {domain} failed: {e}"),
                        )
                        .await;
                        continue;
                    }
                    match estimate.monthly_visits {
                        Some(visits) => {
                            enriched += 1;
                            emitter
                                .log(
                                    "info",
                                    format!(
                                        "Traffic data for {domain}: {visits} monthly visits (via {})",
                                        estimate.source
                                    ),
                                )
                                .await;
                        }
                        None => {
                            emitter
                                .log(
                                    "warning",
                                    format!(
                                        "No traffic data available for {domain}: {}",
                                        estimate.source
                                    ),
                                )
                                .await;
                        }
                    }
                }
                Err(e) => {
                    // Persist the failure too, so the domain is not re-queried.
                    if let Err(store_err) = self
                        .repo
                        .record_traffic(product.id, None, &format!("error: {e:#}"))
                        .await
                    {
                        warn!(domain, error = %store_err, "Failed to persist traffic failure");
                    }
                    self.record_domain_failure(
                        keyword,
                        emitter,
                        format!("Traffic lookup failed for {domain}: {e:#}"),
                    )
                    .await;
                }
            }
        }

        let step2_duration = step2_started.elapsed().as_secs_f64();
        self.registry
            .update(keyword, |run| {
                run.step2_enriched = enriched;
                run.status = RunStatus::CompletedStep2;
            })
            .await;
        emitter
            .step_complete(
                2,
                json!({
                    "domains_enriched": enriched,
                    "domains_processed": total,
                    "duration_seconds": round1(step2_duration),
                }),
            )
            .await;

        // Finalize
        let run = self.finalize_completed(keyword).await;
        let duration = run.and_then(|r| r.duration_seconds);
        self.repo
            .complete_keyword(
                keyword_id,
                discovery.ads_fetched as i64,
                discovered as i64,
                duration.map(|d| d as i64),
            )
            .await?;
        emitter
            .complete(json!({
                "products_discovered": discovered,
                "traffic_enriched": enriched,
                "total_duration_seconds": duration.map(round1),
            }))
            .await;
        self.logs
            .append(keyword, "info", format!("Pipeline completed for keyword: {keyword}"));
        info!(
            keyword,
            step1_products = discovered,
            step2_enriched = enriched,
            "Pipeline completed"
        );

        Ok(())
    }

    async fn finalize_completed(&self, keyword: &str) -> Option<RunSnapshot> {
        self.registry
            .update(keyword, |run| {
                run.status = RunStatus::Completed;
                run.completed_at = Some(Utc::now());
                run.finalize_duration();
            })
            .await
    }

    /// A per-domain stage-2 failure: recorded on the run and logged, never
    /// fatal to the batch.
    async fn record_domain_failure(&self, keyword: &str, emitter: &EventEmitter, message: String) {
        self.registry
            .update(keyword, |run| run.errors.push(message.clone()))
            .await;
        emitter.log("error", message.clone()).await;
        self.logs.append(keyword, "error", message);
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
