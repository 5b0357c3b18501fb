//! Submission configuration with bounded, defaulted knobs.

use serde::{Deserialize, Serialize};

fn default_max_ads() -> u32 {
    50
}
fn default_country_code() -> String {
    "US".to_string()
}
fn default_poll_interval() -> u32 {
    15
}
fn default_concurrency() -> u32 {
    5
}
fn default_timeout() -> u64 {
    900
}
fn default_max_domains_per_minute() -> u32 {
    40
}
fn default_domain_batch_size() -> u32 {
    15
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_cache_ttl_days() -> u32 {
    30
}
fn default_true() -> bool {
    true
}

/// One pipeline submission. Every numeric knob is bounded by [`validate`];
/// out-of-range values are rejected before a run is created. The full config
/// is echoed on the pipeline start event for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub keyword: String,

    // Apify settings
    /// Maximum ads to scrape (1..=500).
    #[serde(default = "default_max_ads")]
    pub max_ads: u32,
    /// Country code for ad targeting.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Apify poll interval in seconds (5..=60).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u32,
    /// Concurrent Apify tasks (1..=20).
    #[serde(default = "default_concurrency")]
    pub apify_concurrency: u32,
    /// Actor run timeout in seconds (60..=3600).
    #[serde(default = "default_timeout")]
    pub apify_timeout_seconds: u64,
    /// Minimum estimated monthly ad spend to keep a discovery (>= 0).
    #[serde(default)]
    pub min_ad_spend_usd: i64,

    // Traffic settings
    /// Domains processed per minute during enrichment (1..=100).
    #[serde(default = "default_max_domains_per_minute")]
    pub max_domains_per_minute: u32,
    /// Enrichment batch size (1..=50).
    #[serde(default = "default_domain_batch_size")]
    pub domain_batch_size: u32,
    /// Traffic lookup retry attempts (0..=5).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Traffic cache TTL in days (1..=90).
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,
    #[serde(default = "default_true")]
    pub html_fallback_enabled: bool,

    // General
    /// Skip all database writes; discovery runs and is discarded.
    #[serde(default)]
    pub dry_run_mode: bool,
}

impl RunRequest {
    /// A request with default knobs, for tests and internal callers.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            max_ads: default_max_ads(),
            country_code: default_country_code(),
            poll_interval_seconds: default_poll_interval(),
            apify_concurrency: default_concurrency(),
            apify_timeout_seconds: default_timeout(),
            min_ad_spend_usd: 0,
            max_domains_per_minute: default_max_domains_per_minute(),
            domain_batch_size: default_domain_batch_size(),
            retry_attempts: default_retry_attempts(),
            cache_ttl_days: default_cache_ttl_days(),
            html_fallback_enabled: true,
            dry_run_mode: false,
        }
    }

    /// Range-check every knob. Returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.keyword.trim().is_empty() {
            return Err("keyword must not be empty".to_string());
        }
        check_range("max_ads", self.max_ads as i64, 1, 500)?;
        check_range("poll_interval_seconds", self.poll_interval_seconds as i64, 5, 60)?;
        check_range("apify_concurrency", self.apify_concurrency as i64, 1, 20)?;
        check_range("apify_timeout_seconds", self.apify_timeout_seconds as i64, 60, 3600)?;
        if self.min_ad_spend_usd < 0 {
            return Err("min_ad_spend_usd must be >= 0".to_string());
        }
        check_range(
            "max_domains_per_minute",
            self.max_domains_per_minute as i64,
            1,
            100,
        )?;
        check_range("domain_batch_size", self.domain_batch_size as i64, 1, 50)?;
        check_range("retry_attempts", self.retry_attempts as i64, 0, 5)?;
        check_range("cache_ttl_days", self.cache_ttl_days as i64, 1, 90)?;
        Ok(())
    }
}

fn check_range(name: &str, value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{name} must be between {min} and {max}, got {value}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RunRequest::new("yoga mats").validate().is_ok());
    }

    #[test]
    fn rejects_blank_keyword() {
        assert!(RunRequest::new("   ").validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_knobs() {
        let mut req = RunRequest::new("kettles");
        req.max_ads = 0;
        assert!(req.validate().is_err());

        let mut req = RunRequest::new("kettles");
        req.max_ads = 501;
        assert!(req.validate().is_err());

        let mut req = RunRequest::new("kettles");
        req.apify_timeout_seconds = 30;
        assert!(req.validate().is_err());

        let mut req = RunRequest::new("kettles");
        req.min_ad_spend_usd = -5;
        assert!(req.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let req: RunRequest = serde_json::from_str(r#"{"keyword": "dog beds"}"#).unwrap();
        assert_eq!(req.max_ads, 50);
        assert_eq!(req.country_code, "US");
        assert_eq!(req.apify_timeout_seconds, 900);
        assert!(!req.dry_run_mode);
        assert!(req.validate().is_ok());
    }
}
