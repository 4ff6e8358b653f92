pub mod domain;
pub mod fetch;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub market_data_api_key: Option<String>,
        pub market_data_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                market_data_api_key: std::env::var("MARKET_DATA_API_KEY").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_market_data_api_key(&self) -> anyhow::Result<&str> {
            self.market_data_api_key
                .as_deref()
                .context("MARKET_DATA_API_KEY is required")
        }
    }
}
