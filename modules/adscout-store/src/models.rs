//! Row types and value objects for the product store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

// ---------------------------------------------------------------------------
// Keyword
// ---------------------------------------------------------------------------

/// Lifecycle of a keyword row, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl KeywordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordState::Pending => "pending",
            KeywordState::Processing => "processing",
            KeywordState::Completed => "completed",
            KeywordState::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "processing" => KeywordState::Processing,
            "completed" => KeywordState::Completed,
            "failed" => KeywordState::Failed,
            _ => KeywordState::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeywordRow {
    pub id: i64,
    pub keyword: String,
    pub status: KeywordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub total_ads_found: i64,
    pub total_products_discovered: i64,
    pub processing_duration_seconds: Option<i64>,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Ad intelligence
// ---------------------------------------------------------------------------

/// Intelligence extracted from ad creatives for one domain. Every field is
/// explicitly optional: absence means the Ad Library did not report it, and
/// the upsert rule treats absent as zero when comparing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdIntelligence {
    // Spend estimates (monthly, USD)
    pub min_monthly_ad_spend: Option<i64>,
    pub max_monthly_ad_spend: Option<i64>,
    pub estimated_monthly_ad_spend: Option<i64>,

    // Impression estimates (monthly)
    pub min_monthly_impressions: Option<i64>,
    pub max_monthly_impressions: Option<i64>,
    pub estimated_monthly_impressions: Option<i64>,

    // Campaign activity
    pub ad_campaign_duration_days: Option<i32>,
    pub total_active_ads: Option<i32>,

    // Platform and geographic breadth
    pub advertising_platforms_count: Option<i32>,
    pub advertising_platforms: Option<String>,
    pub target_countries_count: Option<i32>,
    pub target_countries: Option<String>,

    // Promotional psychology flags (mutable: always refreshed on rediscovery)
    pub features_discount_offer: Option<bool>,
    pub features_urgency_language: Option<bool>,
    pub features_purchase_cta: Option<bool>,
    pub features_social_proof: Option<bool>,
    pub features_free_shipping: Option<bool>,
    pub primary_call_to_action: Option<String>,
    pub ad_creative_themes: Option<String>,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A product to insert or fold into an existing domain row.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub product_page_url: String,
    pub brand_domain: String,
    pub brand_name: Option<String>,
    pub facebook_page_url: Option<String>,
    pub facebook_page_id: Option<String>,
    pub intelligence: AdIntelligence,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: i64,
    pub keyword_id: Option<i64>,
    pub product_page_url: String,
    pub brand_domain: String,
    pub brand_name: Option<String>,
    pub facebook_page_url: Option<String>,
    pub facebook_page_id: Option<String>,
    pub first_discovered: DateTime<Utc>,
    pub last_seen_advertising: Option<DateTime<Utc>>,
    pub intelligence: AdIntelligence,
}

/// Whether an upsert created a new domain row or folded into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

// ---------------------------------------------------------------------------
// Traffic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrafficRow {
    pub id: i64,
    pub product_id: i64,
    pub monthly_visits: Option<i64>,
    pub data_source: Option<String>,
    pub collected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

/// Aggregate view of a keyword's persisted results, used to reconstruct a
/// completed run snapshot when the run is no longer resident in memory.
#[derive(Debug, Clone)]
pub struct KeywordOverview {
    pub products: i64,
    pub enriched: i64,
    pub first_discovered: Option<DateTime<Utc>>,
    pub last_discovered: Option<DateTime<Utc>>,
}

/// Sort order for the results listing. `MonthlyVisits` lives on the traffic
/// row, so that sort happens in memory after the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSort {
    MonthlyVisits,
    BrandName,
    BrandDomain,
    FirstDiscovered,
}

impl ResultSort {
    /// Parse an API sort key. Unknown keys fall back to the traffic sort,
    /// matching what the dashboard asks for by default.
    pub fn parse(s: &str) -> Self {
        match s {
            "brand_name" => ResultSort::BrandName,
            "brand_domain" => ResultSort::BrandDomain,
            "first_discovered" | "discovered_at" => ResultSort::FirstDiscovered,
            _ => ResultSort::MonthlyVisits,
        }
    }
}

/// One row of the joined results listing.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub id: i64,
    pub brand_name: Option<String>,
    pub brand_domain: String,
    pub product_page_url: String,
    pub keyword: String,
    pub monthly_visits: Option<i64>,
    pub data_source: Option<String>,
    pub ads_count: i32,
    pub first_discovered: DateTime<Utc>,
}

/// Storage record counts for the metrics endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub keywords: i64,
    pub products: i64,
    pub products_with_traffic: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DashboardStats {
    pub total_products: i64,
    pub enriched_domains: i64,
    pub total_keywords: i64,
    pub recent_keywords: Vec<String>,
}

// ---------------------------------------------------------------------------
// sqlx::FromRow impls
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, PgRow> for KeywordRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(KeywordRow {
            id: row.try_get("id")?,
            keyword: row.try_get("keyword")?,
            status: KeywordState::parse(&status),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            processed_at: row.try_get("processed_at")?,
            total_ads_found: row.try_get("total_ads_found")?,
            total_products_discovered: row.try_get("total_products_discovered")?,
            processing_duration_seconds: row.try_get("processing_duration_seconds")?,
            error_message: row.try_get("error_message")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            keyword_id: row.try_get("keyword_id")?,
            product_page_url: row.try_get("product_page_url")?,
            brand_domain: row.try_get("brand_domain")?,
            brand_name: row.try_get("brand_name")?,
            facebook_page_url: row.try_get("facebook_page_url")?,
            facebook_page_id: row.try_get("facebook_page_id")?,
            first_discovered: row.try_get("first_discovered")?,
            last_seen_advertising: row.try_get("last_seen_advertising")?,
            intelligence: AdIntelligence {
                min_monthly_ad_spend: row.try_get("min_monthly_ad_spend")?,
                max_monthly_ad_spend: row.try_get("max_monthly_ad_spend")?,
                estimated_monthly_ad_spend: row.try_get("estimated_monthly_ad_spend")?,
                min_monthly_impressions: row.try_get("min_monthly_impressions")?,
                max_monthly_impressions: row.try_get("max_monthly_impressions")?,
                estimated_monthly_impressions: row.try_get("estimated_monthly_impressions")?,
                ad_campaign_duration_days: row.try_get("ad_campaign_duration_days")?,
                total_active_ads: row.try_get("total_active_ads")?,
                advertising_platforms_count: row.try_get("advertising_platforms_count")?,
                advertising_platforms: row.try_get("advertising_platforms")?,
                target_countries_count: row.try_get("target_countries_count")?,
                target_countries: row.try_get("target_countries")?,
                features_discount_offer: row.try_get("features_discount_offer")?,
                features_urgency_language: row.try_get("features_urgency_language")?,
                features_purchase_cta: row.try_get("features_purchase_cta")?,
                features_social_proof: row.try_get("features_social_proof")?,
                features_free_shipping: row.try_get("features_free_shipping")?,
                primary_call_to_action: row.try_get("primary_call_to_action")?,
                ad_creative_themes: row.try_get("ad_creative_themes")?,
            },
        })
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for TrafficRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(TrafficRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            monthly_visits: row.try_get("monthly_visits")?,
            data_source: row.try_get("data_source")?,
            collected_at: row.try_get("collected_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for ResultRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(ResultRow {
            id: row.try_get("id")?,
            brand_name: row.try_get("brand_name")?,
            brand_domain: row.try_get("brand_domain")?,
            product_page_url: row.try_get("product_page_url")?,
            keyword: row.try_get("keyword")?,
            monthly_visits: row.try_get("monthly_visits")?,
            data_source: row.try_get("data_source")?,
            ads_count: row.try_get("ads_count")?,
            first_discovered: row.try_get("first_discovered")?,
        })
    }
}
