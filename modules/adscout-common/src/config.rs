use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Scraping
    pub apify_token: String,
    pub scraper_api_key: String,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    // Optional newline-separated blacklist file (one domain per line)
    pub blacklist_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            apify_token: required_env("APIFY_TOKEN"),
            scraper_api_key: required_env("SCRAPER_API_KEY"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("API_PORT must be a number"),
            blacklist_file: env::var("BLACKLIST_FILE").ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
