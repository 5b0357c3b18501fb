use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdScoutError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No data found for keyword: {0}")]
    KeywordNotFound(String),
}
