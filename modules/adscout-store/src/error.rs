use adscout_common::AdScoutError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AdScoutError {
    fn from(err: StoreError) -> Self {
        AdScoutError::Database(err.to_string())
    }
}
