//! Stage 1 — scrape the Ad Library and persist newly-seen domains.
//!
//! Dedupe order matters: an ad is dropped for a missing URL before the
//! blacklist is consulted, and a blacklisted domain is never counted as
//! "existing". The skip counters feed the run log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use adscout_common::normalize_root_domain;
use adscout_store::{NewProduct, UpsertOutcome};

use crate::config::RunRequest;
use crate::intelligence::{extract_intelligence, AdFilters};
use crate::traits::{AdSource, ProductRepository};

/// Domains that host ad infrastructure or marketplaces, never a brand's own
/// store. Extended by the optional blacklist file.
const DEFAULT_BLACKLIST: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "whatsapp.com",
    "messenger.com",
    "youtube.com",
    "google.com",
    "tiktok.com",
    "twitter.com",
    "x.com",
    "linktr.ee",
    "bit.ly",
];

/// Load the domain blacklist: built-in entries plus an optional
/// newline-separated file (lines starting with `#` are ignored).
pub fn load_blacklist(path: Option<&str>) -> HashSet<String> {
    let mut domains: HashSet<String> = DEFAULT_BLACKLIST.iter().map(|d| d.to_string()).collect();

    if let Some(path) = path {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                for line in text.lines() {
                    let line = line.trim().to_lowercase();
                    if !line.is_empty() && !line.starts_with('#') {
                        domains.insert(line);
                    }
                }
            }
            Err(e) => warn!(path, error = %e, "Could not read blacklist file"),
        }
    }

    info!(count = domains.len(), "Loaded blacklisted domains");
    domains
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkipCounts {
    pub no_url: u32,
    pub blacklisted: u32,
    pub existing: u32,
    pub filtered: u32,
    pub kept: u32,
}

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Distinct-domain products kept (and persisted unless dry-run).
    pub products: Vec<NewProduct>,
    pub ads_fetched: u32,
    pub created: u32,
    pub updated: u32,
    pub skipped: SkipCounts,
}

/// Run the discovery stage for one keyword.
pub async fn run_discovery(
    ads: &Arc<dyn AdSource>,
    repo: &Arc<dyn ProductRepository>,
    blacklist: &HashSet<String>,
    keyword_id: i64,
    request: &RunRequest,
) -> Result<DiscoveryOutcome> {
    let raw_ads = ads
        .fetch_ads(
            &request.keyword,
            request.max_ads,
            &request.country_code,
            request.apify_timeout_seconds,
        )
        .await
        .context("ad scrape failed")?;

    let existing = repo
        .existing_domains()
        .await
        .context("loading existing domains")?;
    let filters = AdFilters::from_request(request);
    let now = Utc::now();

    let mut unique: HashMap<String, NewProduct> = HashMap::new();
    let mut skipped = SkipCounts::default();

    for ad in &raw_ads {
        let Some(landing_url) = ad.landing_url() else {
            skipped.no_url += 1;
            continue;
        };
        let Some(domain) = normalize_root_domain(landing_url) else {
            skipped.no_url += 1;
            continue;
        };

        if blacklist.contains(&domain) {
            skipped.blacklisted += 1;
            continue;
        }
        if existing.contains(&domain) {
            skipped.existing += 1;
            continue;
        }

        let Some(intelligence) = extract_intelligence(ad, &filters, now) else {
            skipped.filtered += 1;
            continue;
        };

        let facebook_page_url = ad
            .page_id
            .as_deref()
            .map(|id| format!("https://www.facebook.com/{id}"));

        // Last ad for a domain wins within this batch; the store-level upsert
        // reconciles against earlier runs.
        unique.insert(
            domain.clone(),
            NewProduct {
                product_page_url: landing_url.to_string(),
                brand_domain: domain,
                brand_name: ad.advertiser_name().map(str::to_string),
                facebook_page_url,
                facebook_page_id: ad.page_id.clone(),
                intelligence,
            },
        );
        skipped.kept += 1;
    }

    info!(
        keyword = request.keyword.as_str(),
        ads = raw_ads.len(),
        kept = skipped.kept,
        no_url = skipped.no_url,
        blacklisted = skipped.blacklisted,
        existing = skipped.existing,
        filtered = skipped.filtered,
        unique_domains = unique.len(),
        "Discovery processing complete"
    );

    let mut outcome = DiscoveryOutcome {
        products: unique.into_values().collect(),
        ads_fetched: raw_ads.len() as u32,
        skipped,
        ..Default::default()
    };

    if request.dry_run_mode {
        info!(keyword = request.keyword.as_str(), "Dry run: skipping database writes");
        return Ok(outcome);
    }

    for product in &outcome.products {
        match repo
            .upsert_product(keyword_id, product, Utc::now())
            .await
            .with_context(|| format!("persisting {}", product.brand_domain))?
        {
            UpsertOutcome::Created => outcome.created += 1,
            UpsertOutcome::Updated => outcome.updated += 1,
        }
    }

    info!(
        keyword = request.keyword.as_str(),
        created = outcome.created,
        updated = outcome.updated,
        "Persisted discovered products"
    );

    Ok(outcome)
}
