pub mod alphavantage;
pub mod types;

use crate::fetch::types::Article;
use anyhow::Result;

/// Latest-quote capability. `Ok(None)` means the source answered but had no
/// quote for the symbol; `Err` is a transport or protocol failure.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_price(&self, symbol: &str) -> Result<Option<String>>;
}

/// News-article capability. Returns the raw feed; time filtering and scoring
/// happen downstream in `domain::sentiment`.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_articles(&self, symbol: &str) -> Result<Vec<Article>>;
}
