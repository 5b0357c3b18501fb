pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    AdLibraryAd, AdLibraryInput, AdSnapshot, ApiResponse, BoundRange, OneOrMany, ProxyConfiguration,
    RegionEntry, RunData, TextValue,
};

use adscout_common::{RetryError, RetryPolicy};
use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for the Facebook Ad Library scraper.
const AD_LIBRARY_SCRAPER: &str = "bo5X18oGenWEV9vVo";

/// Dataset page size when fetching run results.
const DATASET_PAGE_SIZE: usize = 1000;

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    retry: RetryPolicy,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            retry: RetryPolicy::api_defaults(),
        }
    }

    /// Start an Ad Library scrape run. Returns immediately with run metadata.
    /// `timeout_seconds` bounds the actor run server-side.
    pub async fn start_ad_library_run(
        &self,
        input: &AdLibraryInput,
        timeout_seconds: u64,
    ) -> Result<RunData> {
        let url = format!(
            "{}/acts/{}/runs?timeout={}&memory=512",
            BASE_URL, AD_LIBRARY_SCRAPER, timeout_seconds
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    ///
    /// A TIMED-OUT run still returns `Ok` — whatever the actor collected before
    /// the timeout is in its dataset and worth processing.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", BASE_URL, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "TIMED-OUT" => {
                    tracing::warn!(run_id, "Run timed out, continuing with partial dataset");
                    return Ok(api_resp.data);
                }
                "FAILED" | "ABORTED" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch all dataset items from a completed run, paging through the dataset.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!(
                "{}/datasets/{}/items?format=json&clean=true&offset={}&limit={}",
                BASE_URL, dataset_id, offset, DATASET_PAGE_SIZE
            );
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let page: Vec<T> = resp.json().await?;
            let fetched = page.len();
            items.extend(page);
            tracing::debug!(dataset_id, total = items.len(), "Fetched dataset page");

            if fetched < DATASET_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        Ok(items)
    }

    /// Scrape the Ad Library end-to-end: start run, poll, fetch results.
    pub async fn scrape_ad_library(
        &self,
        query: &str,
        max_items: u32,
        country: &str,
        timeout_seconds: u64,
    ) -> Result<Vec<AdLibraryAd>> {
        tracing::info!(query, max_items, country, "Starting Ad Library scrape");

        let input = AdLibraryInput::new(query, max_items, country);
        // Only the start call is retried. Once a run exists, retrying would
        // launch (and pay for) a second actor run.
        let run = self
            .retry
            .run("apify_start_run", || {
                self.start_ad_library_run(&input, timeout_seconds)
            })
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, source } => ApifyError::RetriesExhausted {
                    attempts,
                    source: Box::new(source),
                },
                RetryError::Fatal(source) => source,
            })?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        if completed.default_dataset_id.is_empty() {
            return Err(ApifyError::MissingDataset);
        }
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let ads: Vec<AdLibraryAd> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(count = ads.len(), "Fetched Ad Library ads");

        Ok(ads)
    }
}
