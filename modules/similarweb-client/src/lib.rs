pub mod error;

pub use error::{Result, SimilarWebError};

use std::time::Duration;

use adscout_common::{RetryError, RetryPolicy};
use serde::Deserialize;

/// SimilarWeb's browser-extension lookup endpoint. Fast, and far more
/// permissive about unauthenticated volume than the main site.
const EXTENSION_ENDPOINT: &str = "https://extension.similarweb.com/lookup";

/// ScraperAPI HTTP endpoint for rotating-IP proxying.
const SCRAPER_API_URL: &str = "https://api.scraperapi.com/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// A traffic lookup outcome. `monthly_visits` is `None` when SimilarWeb has
/// no usable figure for the domain; `source` labels where the number came
/// from (or why there is none) so the caller can persist the outcome either way.
#[derive(Debug, Clone)]
pub struct TrafficEstimate {
    pub monthly_visits: Option<i64>,
    pub source: String,
}

impl TrafficEstimate {
    fn no_data(reason: &str) -> Self {
        Self {
            monthly_visits: None,
            source: reason.to_string(),
        }
    }
}

pub struct SimilarWebClient {
    client: reqwest::Client,
    scraper_api_key: String,
    retry: RetryPolicy,
}

impl SimilarWebClient {
    pub fn new(scraper_api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            scraper_api_key,
            retry: RetryPolicy::api_defaults(),
        }
    }

    /// Look up the estimated monthly visits for a domain.
    /// Transient proxy failures are retried internally with backoff; a
    /// response without usable visit data is an `Ok` no-data estimate, not
    /// an error, so the caller can record it and skip the domain next time.
    pub async fn lookup(&self, domain: &str) -> Result<TrafficEstimate> {
        let domain = domain.strip_prefix("www.").unwrap_or(domain);
        tracing::info!(domain, "Looking up traffic estimate");

        let result = self
            .retry
            .run("similarweb_lookup", || self.fetch(domain))
            .await;

        match result {
            Ok(estimate) => {
                match estimate.monthly_visits {
                    Some(visits) => tracing::info!(domain, visits, "Traffic estimate found"),
                    None => tracing::warn!(domain, reason = %estimate.source, "No traffic data"),
                }
                Ok(estimate)
            }
            Err(RetryError::Exhausted { attempts, source }) => {
                Err(SimilarWebError::RetriesExhausted {
                    attempts,
                    source: Box::new(source),
                })
            }
            Err(RetryError::Fatal(e)) => Err(e),
        }
    }

    async fn fetch(&self, domain: &str) -> Result<TrafficEstimate> {
        let target = format!("{EXTENSION_ENDPOINT}?domain={domain}");
        let resp = self
            .client
            .get(SCRAPER_API_URL)
            .query(&[
                ("api_key", self.scraper_api_key.as_str()),
                ("url", target.as_str()),
            ])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SimilarWebError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: LookupResponse = resp.json().await?;
        let Some(raw) = body.visits_text() else {
            return Ok(TrafficEstimate::no_data("no_visits_in_response"));
        };

        match parse_visits(&raw) {
            Some(visits) => Ok(TrafficEstimate {
                monthly_visits: Some(visits),
                source: "extension".to_string(),
            }),
            None => Ok(TrafficEstimate::no_data("unparseable_visits")),
        }
    }
}

// --- Response shape ---

#[derive(Debug, Deserialize)]
struct LookupResponse {
    site_data: Option<SiteData>,
}

#[derive(Debug, Deserialize)]
struct SiteData {
    general_data: Option<GeneralData>,
}

#[derive(Debug, Deserialize)]
struct GeneralData {
    visits: Option<serde_json::Value>,
}

impl LookupResponse {
    fn visits_text(&self) -> Option<String> {
        let visits = self
            .site_data
            .as_ref()?
            .general_data
            .as_ref()?
            .visits
            .as_ref()?;
        match visits {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Parse a visits figure like `402K`, `1.5M`, or `2B` into a count.
/// `<1K` and `null` mean SimilarWeb has no usable figure.
fn parse_visits(text: &str) -> Option<i64> {
    let text = text.trim().to_ascii_uppercase();
    if text.is_empty() || text == "NULL" || text == "<1K" {
        return None;
    }

    let scaled = |suffix: char, factor: f64| -> Option<i64> {
        let number: f64 = text.trim_end_matches(suffix).parse().ok()?;
        Some((number * factor) as i64)
    };

    if text.ends_with('K') {
        scaled('K', 1_000.0)
    } else if text.ends_with('M') {
        scaled('M', 1_000_000.0)
    } else if text.ends_with('B') {
        scaled('B', 1_000_000_000.0)
    } else {
        text.replace(',', "").parse::<f64>().ok().map(|n| n as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_visit_counts() {
        assert_eq!(parse_visits("402K"), Some(402_000));
        assert_eq!(parse_visits("1.5M"), Some(1_500_000));
        assert_eq!(parse_visits("2B"), Some(2_000_000_000));
        assert_eq!(parse_visits("1,234,567"), Some(1_234_567));
        assert_eq!(parse_visits("980"), Some(980));
        assert_eq!(parse_visits(" 3.2m "), Some(3_200_000));
    }

    #[test]
    fn rejects_placeholder_values() {
        assert_eq!(parse_visits("<1K"), None);
        assert_eq!(parse_visits("null"), None);
        assert_eq!(parse_visits(""), None);
        assert_eq!(parse_visits("n/a"), None);
    }

    #[test]
    fn extracts_visits_from_response_json() {
        let resp: LookupResponse = serde_json::from_value(serde_json::json!({
            "site_data": { "general_data": { "visits": "402K" } }
        }))
        .unwrap();
        assert_eq!(resp.visits_text().as_deref(), Some("402K"));

        let empty: LookupResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.visits_text().is_none());
    }
}
