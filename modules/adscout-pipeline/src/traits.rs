// Trait abstractions for the orchestrator's collaborators.
//
// AdSource wraps the Apify Ad Library client, TrafficLookup wraps the
// SimilarWeb client, and ProductRepository wraps the Postgres store.
//
// These enable deterministic testing with MockAdSource, MockTraffic and
// MockRepository: no network, no database. `cargo test` in seconds.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use adscout_store::{
    KeywordOverview, NewProduct, ProductRow, ProductStore, StoreError, UpsertOutcome,
};
use apify_client::{AdLibraryAd, ApifyClient};
use similarweb_client::{SimilarWebClient, TrafficEstimate};

// ---------------------------------------------------------------------------
// AdSource — stage 1 collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AdSource: Send + Sync {
    /// Fetch raw Ad Library ads for a keyword.
    async fn fetch_ads(
        &self,
        keyword: &str,
        max_ads: u32,
        country: &str,
        timeout_seconds: u64,
    ) -> Result<Vec<AdLibraryAd>>;
}

#[async_trait]
impl AdSource for ApifyClient {
    async fn fetch_ads(
        &self,
        keyword: &str,
        max_ads: u32,
        country: &str,
        timeout_seconds: u64,
    ) -> Result<Vec<AdLibraryAd>> {
        Ok(self
            .scrape_ad_library(keyword, max_ads, country, timeout_seconds)
            .await?)
    }
}

// ---------------------------------------------------------------------------
// TrafficLookup — stage 2 collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TrafficLookup: Send + Sync {
    /// Look up an estimated-monthly-visits figure for a domain.
    /// An `Ok` with no visits means the provider has no data; an `Err` means
    /// the lookup itself failed (recorded as a per-domain run error).
    async fn lookup(&self, domain: &str) -> Result<TrafficEstimate>;
}

#[async_trait]
impl TrafficLookup for SimilarWebClient {
    async fn lookup(&self, domain: &str) -> Result<TrafficEstimate> {
        Ok(self.lookup(domain).await?)
    }
}

// ---------------------------------------------------------------------------
// ProductRepository — persistence seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_or_create_keyword(&self, keyword: &str)
        -> std::result::Result<(i64, bool), StoreError>;

    async fn mark_keyword_processing(&self, keyword_id: i64) -> std::result::Result<(), StoreError>;

    async fn complete_keyword(
        &self,
        keyword_id: i64,
        total_ads_found: i64,
        total_products_discovered: i64,
        duration_seconds: Option<i64>,
    ) -> std::result::Result<(), StoreError>;

    async fn fail_keyword(
        &self,
        keyword_id: i64,
        error_message: &str,
    ) -> std::result::Result<(), StoreError>;

    async fn existing_domains(&self) -> std::result::Result<HashSet<String>, StoreError>;

    async fn upsert_product(
        &self,
        keyword_id: i64,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> std::result::Result<UpsertOutcome, StoreError>;

    async fn recent_products(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> std::result::Result<Vec<ProductRow>, StoreError>;

    async fn record_traffic(
        &self,
        product_id: i64,
        monthly_visits: Option<i64>,
        data_source: &str,
    ) -> std::result::Result<(), StoreError>;

    async fn keyword_overview(
        &self,
        keyword: &str,
    ) -> std::result::Result<Option<KeywordOverview>, StoreError>;

    async fn delete_keyword(&self, keyword: &str) -> std::result::Result<Option<u64>, StoreError>;
}

#[async_trait]
impl ProductRepository for ProductStore {
    async fn find_or_create_keyword(
        &self,
        keyword: &str,
    ) -> std::result::Result<(i64, bool), StoreError> {
        ProductStore::find_or_create_keyword(self, keyword).await
    }

    async fn mark_keyword_processing(&self, keyword_id: i64) -> std::result::Result<(), StoreError> {
        ProductStore::mark_keyword_processing(self, keyword_id).await
    }

    async fn complete_keyword(
        &self,
        keyword_id: i64,
        total_ads_found: i64,
        total_products_discovered: i64,
        duration_seconds: Option<i64>,
    ) -> std::result::Result<(), StoreError> {
        ProductStore::complete_keyword(
            self,
            keyword_id,
            total_ads_found,
            total_products_discovered,
            duration_seconds,
        )
        .await
    }

    async fn fail_keyword(
        &self,
        keyword_id: i64,
        error_message: &str,
    ) -> std::result::Result<(), StoreError> {
        ProductStore::fail_keyword(self, keyword_id, error_message).await
    }

    async fn existing_domains(&self) -> std::result::Result<HashSet<String>, StoreError> {
        ProductStore::existing_domains(self).await
    }

    async fn upsert_product(
        &self,
        keyword_id: i64,
        product: &NewProduct,
        now: DateTime<Utc>,
    ) -> std::result::Result<UpsertOutcome, StoreError> {
        ProductStore::upsert_product(self, keyword_id, product, now).await
    }

    async fn recent_products(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> std::result::Result<Vec<ProductRow>, StoreError> {
        ProductStore::recent_products(self, cutoff, limit).await
    }

    async fn record_traffic(
        &self,
        product_id: i64,
        monthly_visits: Option<i64>,
        data_source: &str,
    ) -> std::result::Result<(), StoreError> {
        ProductStore::record_traffic(self, product_id, monthly_visits, data_source).await
    }

    async fn keyword_overview(
        &self,
        keyword: &str,
    ) -> std::result::Result<Option<KeywordOverview>, StoreError> {
        ProductStore::keyword_overview(self, keyword).await
    }

    async fn delete_keyword(&self, keyword: &str) -> std::result::Result<Option<u64>, StoreError> {
        ProductStore::delete_keyword(self, keyword).await
    }
}
