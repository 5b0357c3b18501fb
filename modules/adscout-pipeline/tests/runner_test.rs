//! End-to-end orchestrator scenarios against the in-memory mocks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use adscout_common::AdScoutError;
use adscout_pipeline::testing::{ad_for_domain, MockAdSource, MockRepository, MockTraffic};
use adscout_pipeline::{MetricsCollector, PipelineRunner, RunRequest, RunSnapshot, RunStatus};

fn build_runner(
    ads: Arc<MockAdSource>,
    traffic: Arc<MockTraffic>,
    repo: Arc<MockRepository>,
) -> Arc<PipelineRunner> {
    Arc::new(PipelineRunner::new(
        repo,
        ads,
        traffic,
        Arc::new(MetricsCollector::new()),
        HashSet::new(),
    ))
}

async fn wait_for_terminal(runner: &Arc<PipelineRunner>, keyword: &str) -> RunSnapshot {
    for _ in 0..500 {
        if let Ok(run) = runner.get_status(keyword).await {
            if run.status.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run for {keyword} never reached a terminal state");
}

#[tokio::test]
async fn full_pipeline_enriches_discovered_domains() {
    let ads = Arc::new(MockAdSource::new(vec![
        ad_for_domain("brand-a.com", 1_000),
        ad_for_domain("brand-b.com", 2_000),
        ad_for_domain("brand-c.com", 3_000),
    ]));
    let traffic = Arc::new(
        MockTraffic::new()
            .on_domain("brand-a.com", Some(120_000))
            .on_domain("brand-c.com", Some(80_000)),
    );
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic.clone(), repo.clone());

    runner.submit(RunRequest::new("demo")).await.unwrap();
    let run = wait_for_terminal(&runner, "demo").await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.step1_products, 3);
    assert_eq!(run.step2_enriched, 2);
    assert!(run.duration_seconds.unwrap() > 0.0);
    assert!(run.errors.is_empty());

    assert_eq!(traffic.calls(), 3);
    assert_eq!(repo.products().len(), 3);
    // Every lookup outcome was persisted, including the no-data one.
    assert_eq!(repo.traffic_records().len(), 3);
    assert_eq!(repo.keyword_status("demo").as_deref(), Some("completed"));
}

#[tokio::test]
async fn zero_discoveries_complete_without_touching_traffic() {
    let ads = Arc::new(MockAdSource::empty());
    let traffic = Arc::new(MockTraffic::new());
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic.clone(), repo.clone());

    runner.submit(RunRequest::new("nothing here")).await.unwrap();
    let run = wait_for_terminal(&runner, "nothing here").await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.step1_products, 0);
    assert_eq!(run.step2_enriched, 0);
    assert_eq!(traffic.calls(), 0, "stage 2 never runs on zero results");
    assert_eq!(repo.keyword_status("nothing here").as_deref(), Some("completed"));
}

#[tokio::test]
async fn duplicate_submission_echoes_the_running_snapshot() {
    let ads = Arc::new(
        MockAdSource::new(vec![ad_for_domain("slow.com", 500)])
            .with_delay(Duration::from_millis(300)),
    );
    let traffic = Arc::new(MockTraffic::new());
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads.clone(), traffic, repo.clone());

    let first = runner.submit(RunRequest::new("demo")).await.unwrap();
    let second = runner.submit(RunRequest::new("demo")).await.unwrap();

    assert_eq!(first.status, RunStatus::RunningStep1);
    assert_eq!(second.status, RunStatus::RunningStep1);
    assert_eq!(first.keyword, second.keyword);

    wait_for_terminal(&runner, "demo").await;
    assert_eq!(ads.calls(), 1, "only one scrape for two submissions");
    assert_eq!(repo.keyword_count(), 1, "keyword row not double-persisted");
}

#[tokio::test]
async fn stage_one_failure_marks_the_run_failed() {
    let ads = Arc::new(MockAdSource::failing("apify exploded"));
    let traffic = Arc::new(MockTraffic::new());
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic.clone(), repo.clone());

    runner.submit(RunRequest::new("demo")).await.unwrap();
    let run = wait_for_terminal(&runner, "demo").await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.errors.iter().any(|e| e.contains("apify exploded")));
    assert!(run.duration_seconds.is_some());
    assert_eq!(traffic.calls(), 0);
    assert_eq!(repo.keyword_status("demo").as_deref(), Some("failed"));
}

#[tokio::test]
async fn per_domain_lookup_failure_does_not_abort_the_batch() {
    let ads = Arc::new(MockAdSource::new(vec![
        ad_for_domain("ok-one.com", 1_000),
        ad_for_domain("broken.com", 2_000),
        ad_for_domain("ok-two.com", 3_000),
    ]));
    let traffic = Arc::new(
        MockTraffic::new()
            .on_domain("ok-one.com", Some(10_000))
            .on_domain("ok-two.com", Some(20_000))
            .failing_domain("broken.com"),
    );
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic, repo.clone());

    runner.submit(RunRequest::new("demo")).await.unwrap();
    let run = wait_for_terminal(&runner, "demo").await;

    assert_eq!(run.status, RunStatus::Completed, "one bad domain never fails the run");
    assert_eq!(run.step2_enriched, 2);
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].contains("broken.com"));

    // The failure outcome was persisted so the domain is not re-queried.
    let traffic_records = repo.traffic_records();
    assert_eq!(traffic_records.len(), 3);
    let broken = repo
        .products()
        .into_iter()
        .find(|p| p.brand_domain == "broken.com")
        .unwrap();
    let (visits, source) = &traffic_records[&broken.id];
    assert!(visits.is_none());
    assert!(source.starts_with("error:"));
}

#[tokio::test]
async fn enrichment_is_capped_at_ten_domains() {
    let ads = Arc::new(MockAdSource::new(
        (0..12).map(|i| ad_for_domain(&format!("brand-{i}.com"), 1_000)).collect(),
    ));
    let traffic = Arc::new(MockTraffic::new());
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic.clone(), repo);

    runner.submit(RunRequest::new("demo")).await.unwrap();
    let run = wait_for_terminal(&runner, "demo").await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.step1_products, 12);
    assert_eq!(traffic.calls(), 10, "enrichment subset capped at 10");
}

#[tokio::test]
async fn status_is_reconstructed_from_storage_for_non_resident_runs() {
    use adscout_pipeline::testing::new_product;
    use adscout_pipeline::ProductRepository;
    use chrono::Utc;

    // Seed the repository as if a run happened in an earlier process.
    let repo = Arc::new(MockRepository::new());
    let (keyword_id, _) = repo.find_or_create_keyword("old run").await.unwrap();
    repo.upsert_product(keyword_id, &new_product("seen-a.com", 100), Utc::now())
        .await
        .unwrap();
    repo.upsert_product(keyword_id, &new_product("seen-b.com", 200), Utc::now())
        .await
        .unwrap();
    let products = repo.products();
    repo.record_traffic(products[0].id, Some(9_000), "extension")
        .await
        .unwrap();
    repo.record_traffic(products[1].id, None, "no_data")
        .await
        .unwrap();

    let runner = build_runner(
        Arc::new(MockAdSource::empty()),
        Arc::new(MockTraffic::new()),
        repo,
    );

    let run = runner.get_status("old run").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.step1_products, 2);
    assert_eq!(run.step2_enriched, 1, "only positive visits count as enriched");
    assert!(run.started_at.is_some());

    assert!(matches!(
        runner.get_status("never ran").await,
        Err(AdScoutError::KeywordNotFound(_))
    ));
}

#[tokio::test]
async fn delete_wipes_the_group_and_reports_not_found_for_unknowns() {
    let ads = Arc::new(MockAdSource::new(vec![ad_for_domain("gone.com", 1_000)]));
    let traffic = Arc::new(MockTraffic::new().on_domain("gone.com", Some(1_000)));
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(ads, traffic, repo.clone());

    runner.submit(RunRequest::new("demo")).await.unwrap();
    wait_for_terminal(&runner, "demo").await;

    let deleted = runner.delete("demo").await.unwrap();
    assert_eq!(deleted, 1);
    assert!(matches!(
        runner.get_status("demo").await,
        Err(AdScoutError::KeywordNotFound(_))
    ));
    assert!(runner.logs().recent("demo", 10).is_none());
    assert!(runner.bus().snapshot("demo").await.is_none());

    // Deleting again, or deleting something that never existed, is not-found.
    assert!(matches!(
        runner.delete("demo").await,
        Err(AdScoutError::KeywordNotFound(_))
    ));
    assert!(matches!(
        runner.delete("never ran").await,
        Err(AdScoutError::KeywordNotFound(_))
    ));
}

#[tokio::test]
async fn invalid_submissions_never_create_a_run() {
    let repo = Arc::new(MockRepository::new());
    let runner = build_runner(
        Arc::new(MockAdSource::empty()),
        Arc::new(MockTraffic::new()),
        repo.clone(),
    );

    let mut request = RunRequest::new("demo");
    request.max_ads = 0;
    assert!(matches!(
        runner.submit(request).await,
        Err(AdScoutError::Validation(_))
    ));

    assert!(matches!(
        runner.get_status("demo").await,
        Err(AdScoutError::KeywordNotFound(_))
    ));
    assert_eq!(repo.keyword_count(), 0);
}
