// Test mocks for the pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockAdSource (AdSource) — canned Ad Library ads, optional delay/failure
// - MockTraffic (TrafficLookup) — HashMap-based domain→visits with call count
// - MockRepository (ProductRepository) — stateful in-memory store
//
// Plus helpers for constructing realistic AdLibraryAd fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use adscout_store::{
    AdIntelligence, KeywordOverview, NewProduct, ProductRow, StoreError, UpsertOutcome,
};
use apify_client::{AdLibraryAd, BoundRange, TextValue};
use similarweb_client::TrafficEstimate;

use crate::traits::{AdSource, ProductRepository, TrafficLookup};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// An Ad Library ad landing on `https://{domain}/product` with the given
/// monthly spend estimate.
pub fn ad_for_domain(domain: &str, spend: i64) -> AdLibraryAd {
    AdLibraryAd {
        ad_archive_id: Some(format!("ad-{domain}")),
        page_id: Some("1234567890".to_string()),
        page_name: Some(format!("{domain} store")),
        landing_page_url: Some(format!("https://{domain}/product")),
        ad_creative_body: Some(TextValue::Text(
            "Big sale! Free shipping on all orders".to_string(),
        )),
        call_to_action_type: Some("SHOP_NOW".to_string()),
        spend: Some(BoundRange {
            lower_bound: Some(spend / 2),
            upper_bound: Some(spend * 2 - spend / 2),
        }),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// MockAdSource
// ---------------------------------------------------------------------------

/// Returns canned ads, optionally after a delay (to hold a run in stage 1)
/// or as a failure.
pub struct MockAdSource {
    ads: Vec<AdLibraryAd>,
    delay: Option<Duration>,
    fail: Option<String>,
    calls: AtomicU32,
}

impl MockAdSource {
    pub fn new(ads: Vec<AdLibraryAd>) -> Self {
        Self {
            ads,
            delay: None,
            fail: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing(message: &str) -> Self {
        Self {
            ads: Vec::new(),
            delay: None,
            fail: Some(message.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdSource for MockAdSource {
    async fn fetch_ads(
        &self,
        _keyword: &str,
        _max_ads: u32,
        _country: &str,
        _timeout_seconds: u64,
    ) -> Result<Vec<AdLibraryAd>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail {
            bail!("{message}");
        }
        Ok(self.ads.clone())
    }
}

// ---------------------------------------------------------------------------
// MockTraffic
// ---------------------------------------------------------------------------

/// HashMap-based traffic lookup. Unregistered domains resolve to no-data.
pub struct MockTraffic {
    visits: HashMap<String, Option<i64>>,
    failing: HashSet<String>,
    calls: AtomicU32,
}

impl MockTraffic {
    pub fn new() -> Self {
        Self {
            visits: HashMap::new(),
            failing: HashSet::new(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn on_domain(mut self, domain: &str, visits: Option<i64>) -> Self {
        self.visits.insert(domain.to_string(), visits);
        self
    }

    pub fn failing_domain(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTraffic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrafficLookup for MockTraffic {
    async fn lookup(&self, domain: &str) -> Result<TrafficEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(domain) {
            bail!("simulated traffic failure for {domain}");
        }
        match self.visits.get(domain) {
            Some(Some(visits)) => Ok(TrafficEstimate {
                monthly_visits: Some(*visits),
                source: "extension".to_string(),
            }),
            _ => Ok(TrafficEstimate {
                monthly_visits: None,
                source: "no_data".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MockRepository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RepoState {
    next_keyword_id: i64,
    next_product_id: i64,
    keywords: HashMap<String, i64>,
    keyword_status: HashMap<i64, String>,
    products: Vec<ProductRow>,
    traffic: HashMap<i64, (Option<i64>, String)>,
}

/// Stateful in-memory store implementing the same upsert rules as Postgres.
#[derive(Default)]
pub struct MockRepository {
    state: Mutex<RepoState>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword_count(&self) -> usize {
        self.state.lock().unwrap().keywords.len()
    }

    pub fn keyword_status(&self, keyword: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let id = state.keywords.get(keyword)?;
        state.keyword_status.get(id).cloned()
    }

    pub fn products(&self) -> Vec<ProductRow> {
        self.state.lock().unwrap().products.clone()
    }

    pub fn traffic_records(&self) -> HashMap<i64, (Option<i64>, String)> {
        self.state.lock().unwrap().traffic.clone()
    }
}

#[async_trait]
impl ProductRepository for MockRepository {
    async fn find_or_create_keyword(
        &self,
        keyword: &str,
    ) -> std::result::Result<(i64, bool), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = state.keywords.get(keyword) {
            return Ok((*id, false));
        }
        state.next_keyword_id += 1;
        let id = state.next_keyword_id;
        state.keywords.insert(keyword.to_string(), id);
        state.keyword_status.insert(id, "pending".to_string());
        Ok((id, true))
    }

    async fn mark_keyword_processing(&self, keyword_id: i64) -> std::result::Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .keyword_status
            .insert(keyword_id, "processing".to_string());
        Ok(())
    }

    async fn complete_keyword(
        &self,
        keyword_id: i64,
        _total_ads_found: i64,
        _total_products_discovered: i64,
        _duration_seconds: Option<i64>,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .keyword_status
            .insert(keyword_id, "completed".to_string());
        Ok(())
    }

    async fn fail_keyword(
        &self,
        keyword_id: i64,
        _error_message: &str,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.keyword_status.insert(keyword_id, "failed".to_string());
        Ok(())
    }

    async fn existing_domains(&self) -> std::result::Result<HashSet<String>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .map(|p| p.brand_domain.clone())
            .collect())
    }

    async fn upsert_product(
        &self,
        keyword_id: i64,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> std::result::Result<UpsertOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = state
            .products
            .iter_mut()
            .find(|p| p.brand_domain == product.brand_domain)
        {
            let cur = &mut existing.intelligence;
            let fresh = &product.intelligence;

            if fresh.estimated_monthly_ad_spend.unwrap_or(0)
                > cur.estimated_monthly_ad_spend.unwrap_or(0)
            {
                cur.min_monthly_ad_spend = fresh.min_monthly_ad_spend;
                cur.max_monthly_ad_spend = fresh.max_monthly_ad_spend;
                cur.estimated_monthly_ad_spend = fresh.estimated_monthly_ad_spend;
            }
            if fresh.estimated_monthly_impressions.unwrap_or(0)
                > cur.estimated_monthly_impressions.unwrap_or(0)
            {
                cur.min_monthly_impressions = fresh.min_monthly_impressions;
                cur.max_monthly_impressions = fresh.max_monthly_impressions;
                cur.estimated_monthly_impressions = fresh.estimated_monthly_impressions;
            }
            if fresh.ad_campaign_duration_days.unwrap_or(0)
                > cur.ad_campaign_duration_days.unwrap_or(0)
            {
                cur.ad_campaign_duration_days = fresh.ad_campaign_duration_days;
            }
            if fresh.advertising_platforms_count.unwrap_or(0)
                > cur.advertising_platforms_count.unwrap_or(0)
            {
                cur.advertising_platforms_count = fresh.advertising_platforms_count;
                cur.advertising_platforms = fresh.advertising_platforms.clone();
            }
            if fresh.target_countries_count.unwrap_or(0) > cur.target_countries_count.unwrap_or(0) {
                cur.target_countries_count = fresh.target_countries_count;
                cur.target_countries = fresh.target_countries.clone();
            }

            cur.features_discount_offer = fresh.features_discount_offer;
            cur.features_urgency_language = fresh.features_urgency_language;
            cur.features_purchase_cta = fresh.features_purchase_cta;
            cur.features_social_proof = fresh.features_social_proof;
            cur.features_free_shipping = fresh.features_free_shipping;
            cur.primary_call_to_action = fresh.primary_call_to_action.clone();
            cur.ad_creative_themes = fresh.ad_creative_themes.clone();
            existing.last_seen_advertising = Some(now);

            return Ok(UpsertOutcome::Updated);
        }

        state.next_product_id += 1;
        let id = state.next_product_id;
        state.products.push(ProductRow {
            id,
            keyword_id: Some(keyword_id),
            product_page_url: product.product_page_url.clone(),
            brand_domain: product.brand_domain.clone(),
            brand_name: product.brand_name.clone(),
            facebook_page_url: product.facebook_page_url.clone(),
            facebook_page_id: product.facebook_page_id.clone(),
            first_discovered: now,
            last_seen_advertising: Some(now),
            intelligence: product.intelligence.clone(),
        });
        Ok(UpsertOutcome::Created)
    }

    async fn recent_products(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> std::result::Result<Vec<ProductRow>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<ProductRow> = state
            .products
            .iter()
            .filter(|p| p.first_discovered >= cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.first_discovered, p.id));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn record_traffic(
        &self,
        product_id: i64,
        monthly_visits: Option<i64>,
        data_source: &str,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .traffic
            .insert(product_id, (monthly_visits, data_source.to_string()));
        Ok(())
    }

    async fn keyword_overview(
        &self,
        keyword: &str,
    ) -> std::result::Result<Option<KeywordOverview>, StoreError> {
        let state = self.state.lock().unwrap();
        let Some(keyword_id) = state.keywords.get(keyword) else {
            return Ok(None);
        };
        let rows: Vec<&ProductRow> = state
            .products
            .iter()
            .filter(|p| p.keyword_id == Some(*keyword_id))
            .collect();
        if rows.is_empty() {
            return Ok(None);
        }

        let enriched = rows
            .iter()
            .filter(|p| {
                state
                    .traffic
                    .get(&p.id)
                    .is_some_and(|(visits, _)| visits.unwrap_or(0) > 0)
            })
            .count() as i64;

        Ok(Some(KeywordOverview {
            products: rows.len() as i64,
            enriched,
            first_discovered: rows.iter().map(|p| p.first_discovered).min(),
            last_discovered: rows.iter().map(|p| p.first_discovered).max(),
        }))
    }

    async fn delete_keyword(&self, keyword: &str) -> std::result::Result<Option<u64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(keyword_id) = state.keywords.get(keyword).copied() else {
            return Ok(None);
        };

        let doomed: Vec<i64> = state
            .products
            .iter()
            .filter(|p| p.keyword_id == Some(keyword_id))
            .map(|p| p.id)
            .collect();
        if doomed.is_empty() {
            return Ok(None);
        }

        state.products.retain(|p| p.keyword_id != Some(keyword_id));
        for id in &doomed {
            state.traffic.remove(id);
        }
        state.keywords.remove(keyword);
        state.keyword_status.remove(&keyword_id);
        Ok(Some(doomed.len() as u64))
    }
}

/// Helper to construct a minimal NewProduct for store-level tests.
pub fn new_product(domain: &str, spend: i64) -> NewProduct {
    NewProduct {
        product_page_url: format!("https://{domain}/product"),
        brand_domain: domain.to_string(),
        brand_name: None,
        facebook_page_url: None,
        facebook_page_id: None,
        intelligence: AdIntelligence {
            estimated_monthly_ad_spend: Some(spend),
            ..Default::default()
        },
    }
}
