//! Creative-level intelligence extraction.
//!
//! Turns one loosely-shaped Ad Library ad into the fixed [`AdIntelligence`]
//! record, applying the optional spend/impression/duration filters. Keyword
//! matching here is deliberately coarse — it feeds sortable flags, not NLP.

use chrono::{DateTime, NaiveDate, Utc};

use adscout_store::AdIntelligence;
use apify_client::AdLibraryAd;

use crate::config::RunRequest;

#[derive(Debug, Clone, Copy, Default)]
pub struct AdFilters {
    pub min_spend: Option<i64>,
    pub min_impressions: Option<i64>,
    pub max_days: Option<i32>,
}

impl AdFilters {
    pub fn from_request(request: &RunRequest) -> Self {
        Self {
            min_spend: (request.min_ad_spend_usd > 0).then_some(request.min_ad_spend_usd),
            min_impressions: None,
            max_days: None,
        }
    }
}

const DISCOUNT_KEYWORDS: &[&str] = &["sale", "% off", "discount", "save", "deal", "special offer"];
const URGENCY_KEYWORDS: &[&str] = &[
    "today only",
    "limited time",
    "hurry",
    "last chance",
    "ending soon",
    "while supplies last",
];
const SOCIAL_PROOF_KEYWORDS: &[&str] = &[
    "bestseller",
    "popular",
    "trending",
    "viral",
    "reviews",
    "rated",
    "testimonial",
];
const SHIPPING_KEYWORDS: &[&str] = &["free shipping", "free delivery", "shipping included"];

const ECOMMERCE_CTAS: &[&str] = &[
    "shop_now",
    "buy_now",
    "order_now",
    "get_offer",
    "sign_up",
    "learn_more",
];

const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    ("health_wellness", &["health", "wellness"]),
    ("beauty_skincare", &["beauty", "skincare"]),
    ("fitness", &["fitness", "workout"]),
    ("technology", &["tech", "gadget"]),
    ("home_garden", &["home", "kitchen"]),
    ("fashion", &["fashion", "clothing"]),
];

/// Extract intelligence from one ad. Returns `None` when the ad fails the
/// caller's filters (too little spend, too few impressions, campaign too old).
pub fn extract_intelligence(
    ad: &AdLibraryAd,
    filters: &AdFilters,
    now: DateTime<Utc>,
) -> Option<AdIntelligence> {
    let (min_spend, max_spend, est_spend) = bounds(ad.spend.as_ref(), None);
    let (min_impr, max_impr, est_impr) = bounds(
        ad.impressions.as_ref(),
        ad.impressions_with_index
            .as_ref()
            .and_then(|i| i.impressions_text.as_deref()),
    );

    // Filters only apply when the ad reported any spend/impression signal;
    // ads with no reported ranges pass through for domain discovery.
    let has_signal = est_spend.unwrap_or(0) > 0 || est_impr.unwrap_or(0) > 0;
    if has_signal {
        if filters.min_spend.unwrap_or(0) > est_spend.unwrap_or(0) {
            return None;
        }
        if filters.min_impressions.unwrap_or(0) > est_impr.unwrap_or(0) {
            return None;
        }
    }

    let duration_days = campaign_duration_days(ad, now);
    if let Some(max_days) = filters.max_days {
        if duration_days.unwrap_or(0) > max_days {
            return None;
        }
    }

    let creative = [ad.creative_body(), ad.creative_title()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| creative.contains(k));

    let cta = ad.cta_type().map(str::to_lowercase);
    let purchase_cta = cta
        .as_deref()
        .is_some_and(|c| ECOMMERCE_CTAS.contains(&c));

    let platforms = ad.platforms();
    let (platform_count, platform_list) = if platforms.is_empty() {
        // The Ad Library omits the platform list for plain Facebook-only ads.
        (1, "facebook".to_string())
    } else {
        (platforms.len() as i32, platforms.join(","))
    };

    let countries = ad.countries();
    let (country_count, country_list) = if countries.is_empty() {
        // US-only campaigns usually carry no region breakdown at all.
        (1, "United States".to_string())
    } else {
        (countries.len() as i32, countries.join(","))
    };

    let themes: Vec<&str> = THEME_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| creative.contains(k)))
        .map(|(theme, _)| *theme)
        .collect();

    Some(AdIntelligence {
        min_monthly_ad_spend: min_spend,
        max_monthly_ad_spend: max_spend,
        estimated_monthly_ad_spend: est_spend,
        min_monthly_impressions: min_impr,
        max_monthly_impressions: max_impr,
        estimated_monthly_impressions: est_impr,
        ad_campaign_duration_days: duration_days,
        total_active_ads: Some(1),
        advertising_platforms_count: Some(platform_count),
        advertising_platforms: Some(platform_list),
        target_countries_count: Some(country_count),
        target_countries: Some(country_list),
        features_discount_offer: Some(contains_any(DISCOUNT_KEYWORDS)),
        features_urgency_language: Some(contains_any(URGENCY_KEYWORDS)),
        features_purchase_cta: Some(purchase_cta),
        features_social_proof: Some(contains_any(SOCIAL_PROOF_KEYWORDS)),
        features_free_shipping: Some(contains_any(SHIPPING_KEYWORDS)),
        primary_call_to_action: cta.filter(|c| !c.is_empty()),
        ad_creative_themes: (!themes.is_empty()).then(|| themes.join(",")),
    })
}

/// Resolve (min, max, estimate) from a bound range, falling back to a
/// "10000-50000" style text range. All `None` when nothing was reported.
fn bounds(
    range: Option<&apify_client::BoundRange>,
    text_fallback: Option<&str>,
) -> (Option<i64>, Option<i64>, Option<i64>) {
    let pair = match range {
        Some(r) if r.lower_bound.is_some() || r.upper_bound.is_some() => {
            Some((r.lower_bound.unwrap_or(0), r.upper_bound.unwrap_or(0)))
        }
        _ => text_fallback.and_then(parse_text_range),
    };

    match pair {
        Some((min, max)) => (Some(min), Some(max), Some((min + max) / 2)),
        None => (None, None, None),
    }
}

fn parse_text_range(text: &str) -> Option<(i64, i64)> {
    let (low, high) = text.split_once('-')?;
    let low = low.trim().replace(',', "").parse().ok()?;
    let high = high.trim().replace(',', "").parse().ok()?;
    Some((low, high))
}

/// Days the campaign has been running, from the delivery start timestamp or
/// the unix-seconds fallback. `None` when neither is present or parseable.
fn campaign_duration_days(ad: &AdLibraryAd, now: DateTime<Utc>) -> Option<i32> {
    let started = ad
        .ad_delivery_start_time
        .as_deref()
        .and_then(parse_start_time)
        .or_else(|| {
            ad.start_date
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        })?;

    Some((now - started).num_days().max(0) as i32)
}

fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Some actor builds emit a bare date.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apify_client::{BoundRange, TextValue};

    fn ad_with_creative(body: &str) -> AdLibraryAd {
        AdLibraryAd {
            ad_creative_body: Some(TextValue::Text(body.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn flags_promotional_language() {
        let intel = extract_intelligence(
            &ad_with_creative("Huge sale! Free shipping, rated 5 stars, limited time"),
            &AdFilters::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(intel.features_discount_offer, Some(true));
        assert_eq!(intel.features_free_shipping, Some(true));
        assert_eq!(intel.features_social_proof, Some(true));
        assert_eq!(intel.features_urgency_language, Some(true));
    }

    #[test]
    fn computes_midpoint_estimates() {
        let ad = AdLibraryAd {
            spend: Some(BoundRange {
                lower_bound: Some(100),
                upper_bound: Some(500),
            }),
            ..Default::default()
        };
        let intel = extract_intelligence(&ad, &AdFilters::default(), Utc::now()).unwrap();
        assert_eq!(intel.estimated_monthly_ad_spend, Some(300));
        assert_eq!(intel.min_monthly_ad_spend, Some(100));
        assert_eq!(intel.estimated_monthly_impressions, None);
    }

    #[test]
    fn min_spend_filter_drops_weak_ads_but_not_unreported_ones() {
        let filters = AdFilters {
            min_spend: Some(1_000),
            ..Default::default()
        };

        let weak = AdLibraryAd {
            spend: Some(BoundRange {
                lower_bound: Some(10),
                upper_bound: Some(50),
            }),
            ..Default::default()
        };
        assert!(extract_intelligence(&weak, &filters, Utc::now()).is_none());

        // No reported ranges at all: passes through for domain discovery.
        let silent = AdLibraryAd::default();
        assert!(extract_intelligence(&silent, &filters, Utc::now()).is_some());
    }

    #[test]
    fn impressions_fall_back_to_text_range() {
        let ad: AdLibraryAd = serde_json::from_value(serde_json::json!({
            "impressions_with_index": { "impressions_text": "10,000-50,000" }
        }))
        .unwrap();
        let intel = extract_intelligence(&ad, &AdFilters::default(), Utc::now()).unwrap();
        assert_eq!(intel.min_monthly_impressions, Some(10_000));
        assert_eq!(intel.estimated_monthly_impressions, Some(30_000));
    }

    #[test]
    fn campaign_duration_comes_from_delivery_start() {
        let ad = AdLibraryAd {
            ad_delivery_start_time: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let now = DateTime::parse_from_rfc3339("2024-01-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let intel = extract_intelligence(&ad, &AdFilters::default(), now).unwrap();
        assert_eq!(intel.ad_campaign_duration_days, Some(30));
    }

    #[test]
    fn max_days_filter_drops_stale_campaigns() {
        let ad = AdLibraryAd {
            ad_delivery_start_time: Some("2023-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        let filters = AdFilters {
            max_days: Some(90),
            ..Default::default()
        };
        assert!(extract_intelligence(&ad, &filters, Utc::now()).is_none());
    }

    #[test]
    fn platform_and_country_defaults_apply() {
        let intel =
            extract_intelligence(&AdLibraryAd::default(), &AdFilters::default(), Utc::now())
                .unwrap();
        assert_eq!(intel.advertising_platforms.as_deref(), Some("facebook"));
        assert_eq!(intel.advertising_platforms_count, Some(1));
        assert_eq!(intel.target_countries.as_deref(), Some("United States"));
    }
}
