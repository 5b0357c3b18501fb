//! ProductStore — Postgres persistence for keywords, discovered products,
//! and traffic records.
//!
//! Every method acquires from the pool for one unit of work; nothing holds
//! a connection across await points outside its own query.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::models::{
    DashboardStats, KeywordOverview, KeywordRow, KeywordState, NewProduct, ProductRow, ResultRow,
    ResultSort, StoreStats, TrafficRow, UpsertOutcome,
};
use crate::schema::SCHEMA;

const PRODUCT_COLUMNS: &str = "id, keyword_id, product_page_url, brand_domain, brand_name, \
     facebook_page_url, facebook_page_id, first_discovered, last_seen_advertising, \
     min_monthly_ad_spend, max_monthly_ad_spend, estimated_monthly_ad_spend, \
     min_monthly_impressions, max_monthly_impressions, estimated_monthly_impressions, \
     ad_campaign_duration_days, total_active_ads, advertising_platforms_count, \
     advertising_platforms, target_countries_count, target_countries, \
     features_discount_offer, features_urgency_language, features_purchase_cta, \
     features_social_proof, features_free_shipping, primary_call_to_action, ad_creative_themes";

#[derive(Clone)]
pub struct ProductStore {
    pool: PgPool,
}

impl ProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema. Idempotent; called once at startup.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Schema applied");
        Ok(())
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // --- Keywords ---

    /// Find or create a keyword row. Atomic under concurrent submissions of
    /// the same string. Returns (id, created).
    pub async fn find_or_create_keyword(&self, keyword: &str) -> Result<(i64, bool)> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO keywords (keyword) VALUES ($1) ON CONFLICT (keyword) DO NOTHING RETURNING id",
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = inserted {
            return Ok((id, true));
        }

        let (id,) = sqlx::query_as::<_, (i64,)>("SELECT id FROM keywords WHERE keyword = $1")
            .bind(keyword)
            .fetch_one(&self.pool)
            .await?;
        Ok((id, false))
    }

    pub async fn mark_keyword_processing(&self, keyword_id: i64) -> Result<()> {
        sqlx::query("UPDATE keywords SET status = $2, updated_at = now() WHERE id = $1")
            .bind(keyword_id)
            .bind(KeywordState::Processing.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn keyword_row(&self, keyword: &str) -> Result<Option<KeywordRow>> {
        let row = sqlx::query_as::<_, KeywordRow>(
            "SELECT id, keyword, status, created_at, updated_at, processed_at, \
             total_ads_found, total_products_discovered, processing_duration_seconds, \
             error_message FROM keywords WHERE keyword = $1",
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn complete_keyword(
        &self,
        keyword_id: i64,
        total_ads_found: i64,
        total_products_discovered: i64,
        duration_seconds: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE keywords
            SET status = $5,
                updated_at = now(),
                processed_at = now(),
                total_ads_found = $2,
                total_products_discovered = $3,
                processing_duration_seconds = $4,
                error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(keyword_id)
        .bind(total_ads_found)
        .bind(total_products_discovered)
        .bind(duration_seconds)
        .bind(KeywordState::Completed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_keyword(&self, keyword_id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE keywords
            SET status = $3,
                updated_at = now(),
                processed_at = now(),
                error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(keyword_id)
        .bind(error_message)
        .bind(KeywordState::Failed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Keywords that produced at least one product, most recent first.
    pub async fn keywords_with_products(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT k.keyword
            FROM keywords k
            JOIN discovered_products p ON p.keyword_id = k.id
            GROUP BY k.keyword
            ORDER BY MAX(p.first_discovered) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    // --- Products ---

    /// All domains currently in the store. Used by discovery to skip
    /// already-known brands.
    pub async fn existing_domains(&self) -> Result<HashSet<String>> {
        let rows =
            sqlx::query_as::<_, (String,)>("SELECT brand_domain FROM discovered_products")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }

    /// Insert a product, or fold it into the existing row for its domain.
    ///
    /// Better-data rule: each intelligence group (spend, impressions,
    /// duration, platform breadth, country breadth) is replaced only when the
    /// new estimate is strictly higher — groups are compared independently,
    /// so a row's fields may come from different discovery events. The
    /// psychology flags, CTA, themes, and last-seen timestamp are always
    /// refreshed.
    pub async fn upsert_product(
        &self,
        keyword_id: i64,
        new: &NewProduct,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM discovered_products WHERE brand_domain = $1 FOR UPDATE"
        ))
        .bind(&new.brand_domain)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(current) => {
                let cur = &current.intelligence;
                let fresh = &new.intelligence;

                let (min_spend, max_spend, est_spend) = if fresh
                    .estimated_monthly_ad_spend
                    .unwrap_or(0)
                    > cur.estimated_monthly_ad_spend.unwrap_or(0)
                {
                    (
                        fresh.min_monthly_ad_spend,
                        fresh.max_monthly_ad_spend,
                        fresh.estimated_monthly_ad_spend,
                    )
                } else {
                    (
                        cur.min_monthly_ad_spend,
                        cur.max_monthly_ad_spend,
                        cur.estimated_monthly_ad_spend,
                    )
                };

                let (min_impr, max_impr, est_impr) = if fresh
                    .estimated_monthly_impressions
                    .unwrap_or(0)
                    > cur.estimated_monthly_impressions.unwrap_or(0)
                {
                    (
                        fresh.min_monthly_impressions,
                        fresh.max_monthly_impressions,
                        fresh.estimated_monthly_impressions,
                    )
                } else {
                    (
                        cur.min_monthly_impressions,
                        cur.max_monthly_impressions,
                        cur.estimated_monthly_impressions,
                    )
                };

                let duration = if fresh.ad_campaign_duration_days.unwrap_or(0)
                    > cur.ad_campaign_duration_days.unwrap_or(0)
                {
                    fresh.ad_campaign_duration_days
                } else {
                    cur.ad_campaign_duration_days
                };

                let (platform_count, platforms) = if fresh
                    .advertising_platforms_count
                    .unwrap_or(0)
                    > cur.advertising_platforms_count.unwrap_or(0)
                {
                    (
                        fresh.advertising_platforms_count,
                        fresh.advertising_platforms.clone(),
                    )
                } else {
                    (
                        cur.advertising_platforms_count,
                        cur.advertising_platforms.clone(),
                    )
                };

                let (country_count, countries) = if fresh.target_countries_count.unwrap_or(0)
                    > cur.target_countries_count.unwrap_or(0)
                {
                    (fresh.target_countries_count, fresh.target_countries.clone())
                } else {
                    (cur.target_countries_count, cur.target_countries.clone())
                };

                sqlx::query(
                    r#"
                    UPDATE discovered_products SET
                        min_monthly_ad_spend = $2,
                        max_monthly_ad_spend = $3,
                        estimated_monthly_ad_spend = $4,
                        min_monthly_impressions = $5,
                        max_monthly_impressions = $6,
                        estimated_monthly_impressions = $7,
                        ad_campaign_duration_days = $8,
                        advertising_platforms_count = $9,
                        advertising_platforms = $10,
                        target_countries_count = $11,
                        target_countries = $12,
                        features_discount_offer = $13,
                        features_urgency_language = $14,
                        features_purchase_cta = $15,
                        features_social_proof = $16,
                        features_free_shipping = $17,
                        primary_call_to_action = $18,
                        ad_creative_themes = $19,
                        last_seen_advertising = $20
                    WHERE id = $1
                    "#,
                )
                .bind(current.id)
                .bind(min_spend)
                .bind(max_spend)
                .bind(est_spend)
                .bind(min_impr)
                .bind(max_impr)
                .bind(est_impr)
                .bind(duration)
                .bind(platform_count)
                .bind(platforms)
                .bind(country_count)
                .bind(countries)
                .bind(fresh.features_discount_offer)
                .bind(fresh.features_urgency_language)
                .bind(fresh.features_purchase_cta)
                .bind(fresh.features_social_proof)
                .bind(fresh.features_free_shipping)
                .bind(&fresh.primary_call_to_action)
                .bind(&fresh.ad_creative_themes)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                UpsertOutcome::Updated
            }
            None => {
                let i = &new.intelligence;
                sqlx::query(
                    r#"
                    INSERT INTO discovered_products (
                        keyword_id, product_page_url, brand_domain, brand_name,
                        facebook_page_url, facebook_page_id,
                        first_discovered, last_seen_advertising,
                        min_monthly_ad_spend, max_monthly_ad_spend, estimated_monthly_ad_spend,
                        min_monthly_impressions, max_monthly_impressions, estimated_monthly_impressions,
                        ad_campaign_duration_days, total_active_ads,
                        advertising_platforms_count, advertising_platforms,
                        target_countries_count, target_countries,
                        features_discount_offer, features_urgency_language, features_purchase_cta,
                        features_social_proof, features_free_shipping,
                        primary_call_to_action, ad_creative_themes
                    ) VALUES (
                        $1, $2, $3, $4, $5, $6, $7, $7,
                        $8, $9, $10, $11, $12, $13, $14, $15,
                        $16, $17, $18, $19,
                        $20, $21, $22, $23, $24, $25, $26
                    )
                    "#,
                )
                .bind(keyword_id)
                .bind(&new.product_page_url)
                .bind(&new.brand_domain)
                .bind(&new.brand_name)
                .bind(&new.facebook_page_url)
                .bind(&new.facebook_page_id)
                .bind(now)
                .bind(i.min_monthly_ad_spend)
                .bind(i.max_monthly_ad_spend)
                .bind(i.estimated_monthly_ad_spend)
                .bind(i.min_monthly_impressions)
                .bind(i.max_monthly_impressions)
                .bind(i.estimated_monthly_impressions)
                .bind(i.ad_campaign_duration_days)
                .bind(i.total_active_ads)
                .bind(i.advertising_platforms_count)
                .bind(&i.advertising_platforms)
                .bind(i.target_countries_count)
                .bind(&i.target_countries)
                .bind(i.features_discount_offer)
                .bind(i.features_urgency_language)
                .bind(i.features_purchase_cta)
                .bind(i.features_social_proof)
                .bind(i.features_free_shipping)
                .bind(&i.primary_call_to_action)
                .bind(&i.ad_creative_themes)
                .execute(&mut *tx)
                .await?;

                UpsertOutcome::Created
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Products discovered since `cutoff`, in arrival order.
    pub async fn recent_products(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ProductRow>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM discovered_products \
             WHERE first_discovered >= $1 ORDER BY first_discovered ASC, id ASC LIMIT $2"
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // --- Traffic ---

    /// Record a traffic lookup outcome, replacing any previous record for the
    /// product (latest wins). No-data outcomes are recorded too, so the
    /// domain is not re-queried.
    pub async fn record_traffic(
        &self,
        product_id: i64,
        monthly_visits: Option<i64>,
        data_source: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO traffic_records (product_id, monthly_visits, data_source, collected_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (product_id) DO UPDATE SET
                monthly_visits = EXCLUDED.monthly_visits,
                data_source = EXCLUDED.data_source,
                collected_at = now()
            "#,
        )
        .bind(product_id)
        .bind(monthly_visits)
        .bind(data_source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn traffic_for_product(&self, product_id: i64) -> Result<Option<TrafficRow>> {
        let row = sqlx::query_as::<_, TrafficRow>(
            "SELECT id, product_id, monthly_visits, data_source, collected_at \
             FROM traffic_records WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // --- Read views ---

    /// Aggregate view used to reconstruct a completed run snapshot from
    /// storage. `None` when the keyword has no persisted products.
    pub async fn keyword_overview(&self, keyword: &str) -> Result<Option<KeywordOverview>> {
        let (products, enriched, first, last) =
            sqlx::query_as::<_, (i64, i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
                r#"
                SELECT COUNT(p.id),
                       COUNT(t.id) FILTER (WHERE t.monthly_visits > 0),
                       MIN(p.first_discovered),
                       MAX(p.first_discovered)
                FROM discovered_products p
                JOIN keywords k ON k.id = p.keyword_id
                LEFT JOIN traffic_records t ON t.product_id = p.id
                WHERE k.keyword = $1
                "#,
            )
            .bind(keyword)
            .fetch_one(&self.pool)
            .await?;

        if products == 0 {
            return Ok(None);
        }

        Ok(Some(KeywordOverview {
            products,
            enriched,
            first_discovered: first,
            last_discovered: last,
        }))
    }

    /// Joined results listing for one keyword. Sorting by a product column
    /// happens in SQL; sorting by monthly visits happens in memory because
    /// the figure lives on the traffic row.
    /// Returns the page of rows plus the total row count.
    pub async fn results_for_keyword(
        &self,
        keyword: &str,
        sort: ResultSort,
        descending: bool,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ResultRow>, i64)> {
        const BASE: &str = r#"
            SELECT p.id, p.brand_name, p.brand_domain, p.product_page_url,
                   k.keyword AS keyword,
                   t.monthly_visits, t.data_source,
                   COALESCE(p.total_active_ads, 1) AS ads_count,
                   p.first_discovered
            FROM discovered_products p
            JOIN keywords k ON k.id = p.keyword_id
            LEFT JOIN traffic_records t ON t.product_id = p.id
            WHERE k.keyword = $1
        "#;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM discovered_products p \
             JOIN keywords k ON k.id = p.keyword_id WHERE k.keyword = $1",
        )
        .bind(keyword)
        .fetch_one(&self.pool)
        .await?;

        let rows = match sort {
            ResultSort::MonthlyVisits => {
                let mut all = sqlx::query_as::<_, ResultRow>(BASE)
                    .bind(keyword)
                    .fetch_all(&self.pool)
                    .await?;
                all.sort_by_key(|r| r.monthly_visits.unwrap_or(0));
                if descending {
                    all.reverse();
                }
                all.into_iter()
                    .skip(offset.max(0) as usize)
                    .take(limit.max(0) as usize)
                    .collect()
            }
            _ => {
                let column = match sort {
                    ResultSort::BrandName => "p.brand_name",
                    ResultSort::BrandDomain => "p.brand_domain",
                    _ => "p.first_discovered",
                };
                let direction = if descending { "DESC" } else { "ASC" };
                let query =
                    format!("{BASE} ORDER BY {column} {direction}, p.id ASC LIMIT $2 OFFSET $3");
                sqlx::query_as::<_, ResultRow>(&query)
                    .bind(keyword)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok((rows, total))
    }

    // --- Deletion ---

    /// Delete a keyword's products, their traffic records, and the keyword
    /// row as one transaction. Returns the deleted product count, or `None`
    /// when the keyword has nothing persisted (caller reports not-found).
    pub async fn delete_keyword(&self, keyword: &str) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let keyword_id = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM keywords WHERE keyword = $1 FOR UPDATE",
        )
        .bind(keyword)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((keyword_id,)) = keyword_id else {
            return Ok(None);
        };

        let (products,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM discovered_products WHERE keyword_id = $1")
                .bind(keyword_id)
                .fetch_one(&mut *tx)
                .await?;

        if products == 0 {
            return Ok(None);
        }

        sqlx::query(
            "DELETE FROM traffic_records WHERE product_id IN \
             (SELECT id FROM discovered_products WHERE keyword_id = $1)",
        )
        .bind(keyword_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM discovered_products WHERE keyword_id = $1")
            .bind(keyword_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM keywords WHERE id = $1")
            .bind(keyword_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(keyword, products, "Deleted keyword results");
        Ok(Some(products as u64))
    }

    // --- Stats ---

    /// Record counts for the metrics endpoint.
    pub async fn stats(&self) -> Result<StoreStats> {
        let (keywords, products, products_with_traffic) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT (SELECT COUNT(*) FROM keywords),
                       (SELECT COUNT(*) FROM discovered_products),
                       (SELECT COUNT(DISTINCT product_id) FROM traffic_records)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            keywords,
            products,
            products_with_traffic,
        })
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let (total_products, enriched_domains, total_keywords) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT (SELECT COUNT(*) FROM discovered_products),
                       (SELECT COUNT(*) FROM traffic_records WHERE monthly_visits IS NOT NULL),
                       (SELECT COUNT(DISTINCT k.id) FROM keywords k
                        JOIN discovered_products p ON p.keyword_id = k.id)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let recent_keywords = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT k.keyword
            FROM keywords k
            JOIN discovered_products p ON p.keyword_id = k.id
            GROUP BY k.keyword
            ORDER BY MAX(p.first_discovered) DESC
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(k,)| k)
        .collect();

        Ok(DashboardStats {
            total_products,
            enriched_domains,
            total_keywords,
            recent_keywords,
        })
    }
}
