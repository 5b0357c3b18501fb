pub mod config;
pub mod domain;
pub mod error;
pub mod pagination;
pub mod retry;

pub use config::Config;
pub use domain::normalize_root_domain;
pub use error::AdScoutError;
pub use retry::{RetryError, RetryPolicy, Retryable};
