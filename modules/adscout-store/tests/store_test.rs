//! Integration tests for ProductStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use adscout_store::{
    AdIntelligence, KeywordState, NewProduct, ProductStore, ResultSort, UpsertOutcome,
};
use chrono::Utc;
use sqlx::PgPool;

/// Get a store against a clean test database, or skip if none is available.
async fn test_store() -> Option<ProductStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = ProductStore::new(pool.clone());
    store.migrate().await.ok()?;

    sqlx::query("TRUNCATE traffic_records, discovered_products, keywords RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(store)
}

fn product(domain: &str, spend: i64, impressions: i64, discount: bool) -> NewProduct {
    NewProduct {
        product_page_url: format!("https://{domain}/landing"),
        brand_domain: domain.to_string(),
        brand_name: Some("Test Brand".to_string()),
        facebook_page_url: None,
        facebook_page_id: None,
        intelligence: AdIntelligence {
            min_monthly_ad_spend: Some(spend / 2),
            max_monthly_ad_spend: Some(spend * 2),
            estimated_monthly_ad_spend: Some(spend),
            min_monthly_impressions: Some(impressions / 2),
            max_monthly_impressions: Some(impressions * 2),
            estimated_monthly_impressions: Some(impressions),
            ad_campaign_duration_days: Some(30),
            total_active_ads: Some(1),
            features_discount_offer: Some(discount),
            features_purchase_cta: Some(true),
            ..Default::default()
        },
    }
}

// =========================================================================
// Keywords
// =========================================================================

#[tokio::test]
async fn find_or_create_keyword_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };

    let (id1, created1) = store.find_or_create_keyword("yoga mats").await.unwrap();
    let (id2, created2) = store.find_or_create_keyword("yoga mats").await.unwrap();

    assert!(created1);
    assert!(!created2);
    assert_eq!(id1, id2);
}

#[tokio::test]
async fn keyword_status_follows_the_run_lifecycle() {
    let Some(store) = test_store().await else {
        return;
    };

    let (id, _) = store.find_or_create_keyword("resistance bands").await.unwrap();
    let row = store.keyword_row("resistance bands").await.unwrap().unwrap();
    assert_eq!(row.status, KeywordState::Pending);

    store.mark_keyword_processing(id).await.unwrap();
    let row = store.keyword_row("resistance bands").await.unwrap().unwrap();
    assert_eq!(row.status, KeywordState::Processing);

    store.complete_keyword(id, 40, 7, Some(12)).await.unwrap();
    let row = store.keyword_row("resistance bands").await.unwrap().unwrap();
    assert_eq!(row.status, KeywordState::Completed);
    assert_eq!(row.total_ads_found, 40);
    assert_eq!(row.total_products_discovered, 7);
    assert_eq!(row.processing_duration_seconds, Some(12));
    assert!(row.processed_at.is_some());

    store.fail_keyword(id, "apify credit exhausted").await.unwrap();
    let row = store.keyword_row("resistance bands").await.unwrap().unwrap();
    assert_eq!(row.status, KeywordState::Failed);
    assert_eq!(row.error_message.as_deref(), Some("apify credit exhausted"));
}

// =========================================================================
// Product upserts
// =========================================================================

#[tokio::test]
async fn rediscovery_with_higher_spend_replaces_estimates() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("posture corrector").await.unwrap();

    let first = store
        .upsert_product(kid, &product("acme.com", 1_000, 50_000, true), Utc::now())
        .await
        .unwrap();
    assert_eq!(first, UpsertOutcome::Created);

    let second = store
        .upsert_product(kid, &product("acme.com", 5_000, 200_000, false), Utc::now())
        .await
        .unwrap();
    assert_eq!(second, UpsertOutcome::Updated);

    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "one row per domain");

    let i = &rows[0].intelligence;
    assert_eq!(i.estimated_monthly_ad_spend, Some(5_000));
    assert_eq!(i.estimated_monthly_impressions, Some(200_000));
    // Psychology flags always come from the latest upsert.
    assert_eq!(i.features_discount_offer, Some(false));
}

#[tokio::test]
async fn rediscovery_with_lower_spend_keeps_existing_estimates() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("dog beds").await.unwrap();

    store
        .upsert_product(kid, &product("dogco.com", 9_000, 300_000, false), Utc::now())
        .await
        .unwrap();
    store
        .upsert_product(kid, &product("dogco.com", 100, 1_000, true), Utc::now())
        .await
        .unwrap();

    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    let i = &rows[0].intelligence;
    assert_eq!(i.estimated_monthly_ad_spend, Some(9_000));
    assert_eq!(i.estimated_monthly_impressions, Some(300_000));
    // Flags still refresh even when the estimates do not.
    assert_eq!(i.features_discount_offer, Some(true));
}

// =========================================================================
// Traffic records
// =========================================================================

#[tokio::test]
async fn traffic_record_is_latest_wins_not_append() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("kettles").await.unwrap();
    store
        .upsert_product(kid, &product("kettle.co", 500, 10_000, false), Utc::now())
        .await
        .unwrap();
    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    let product_id = rows[0].id;

    store
        .record_traffic(product_id, Some(400_000), "extension")
        .await
        .unwrap();
    store
        .record_traffic(product_id, None, "no_visits_in_response")
        .await
        .unwrap();

    let traffic = store.traffic_for_product(product_id).await.unwrap().unwrap();
    assert_eq!(traffic.monthly_visits, None);
    assert_eq!(traffic.data_source.as_deref(), Some("no_visits_in_response"));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.products_with_traffic, 1, "one record per product");
}

// =========================================================================
// Read views and deletion
// =========================================================================

#[tokio::test]
async fn keyword_overview_counts_only_positive_visits_as_enriched() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("standing desks").await.unwrap();
    store
        .upsert_product(kid, &product("desk-a.com", 100, 1_000, false), Utc::now())
        .await
        .unwrap();
    store
        .upsert_product(kid, &product("desk-b.com", 200, 2_000, false), Utc::now())
        .await
        .unwrap();

    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    store.record_traffic(rows[0].id, Some(10_000), "extension").await.unwrap();
    store.record_traffic(rows[1].id, None, "no_data").await.unwrap();

    let overview = store.keyword_overview("standing desks").await.unwrap().unwrap();
    assert_eq!(overview.products, 2);
    assert_eq!(overview.enriched, 1);
    assert!(overview.first_discovered.is_some());

    assert!(store.keyword_overview("never ran").await.unwrap().is_none());
}

#[tokio::test]
async fn results_listing_sorts_by_visits_in_memory() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("blenders").await.unwrap();
    for (domain, spend) in [("blend-a.com", 100), ("blend-b.com", 200), ("blend-c.com", 300)] {
        store
            .upsert_product(kid, &product(domain, spend, 1_000, false), Utc::now())
            .await
            .unwrap();
    }
    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    store.record_traffic(rows[0].id, Some(5_000), "extension").await.unwrap();
    store.record_traffic(rows[1].id, Some(50_000), "extension").await.unwrap();
    // rows[2] has no traffic record at all

    let (page, total) = store
        .results_for_keyword("blenders", ResultSort::MonthlyVisits, true, 0, 10)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page[0].monthly_visits, Some(50_000));
    assert_eq!(page[1].monthly_visits, Some(5_000));
    assert_eq!(page[2].monthly_visits, None);
}

#[tokio::test]
async fn delete_removes_the_whole_group_and_reports_absent_keywords() {
    let Some(store) = test_store().await else {
        return;
    };
    let (kid, _) = store.find_or_create_keyword("air fryers").await.unwrap();
    store
        .upsert_product(kid, &product("fryer.com", 100, 1_000, false), Utc::now())
        .await
        .unwrap();
    let rows = store
        .recent_products(Utc::now() - chrono::Duration::minutes(5), 10)
        .await
        .unwrap();
    store.record_traffic(rows[0].id, Some(1_000), "extension").await.unwrap();

    let deleted = store.delete_keyword("air fryers").await.unwrap();
    assert_eq!(deleted, Some(1));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.products, 0);
    assert_eq!(stats.products_with_traffic, 0);
    assert_eq!(stats.keywords, 0);

    // Second delete and never-seen keyword both report not-found.
    assert_eq!(store.delete_keyword("air fryers").await.unwrap(), None);
    assert_eq!(store.delete_keyword("toasters").await.unwrap(), None);
}
