use adscout_common::Retryable;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimilarWebError>;

#[derive(Debug, Error)]
pub enum SimilarWebError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SimilarWebError>,
    },
}

impl From<reqwest::Error> for SimilarWebError {
    fn from(err: reqwest::Error) -> Self {
        SimilarWebError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SimilarWebError {
    fn from(err: serde_json::Error) -> Self {
        SimilarWebError::Parse(err.to_string())
    }
}

impl Retryable for SimilarWebError {
    /// The proxy surfaces rate limiting as 429 or 403; gateway errors as 5xx.
    /// Timeouts arrive as network errors. Everything else is final.
    fn is_retryable(&self) -> bool {
        match self {
            SimilarWebError::Network(_) => true,
            SimilarWebError::Api { status, .. } => {
                matches!(status, 429 | 403 | 502 | 503 | 504)
            }
            SimilarWebError::Parse(_) | SimilarWebError::RetriesExhausted { .. } => false,
        }
    }
}
