use crate::config::Settings;
use crate::fetch::types::Article;
use crate::fetch::{NewsSource, PriceSource};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Feed timestamps look like "20260127T093000" (UTC).
const TIME_PUBLISHED_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_market_data_api_key()?.to_string();
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        symbol_param: (&str, &str),
    ) -> Result<T> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .query(&[
                ("function", function),
                symbol_param,
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("{function} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {function} response"))?;
        if !status.is_success() {
            anyhow::bail!("{function} HTTP {status}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("failed to parse {function} response"))
    }
}

#[async_trait::async_trait]
impl PriceSource for AlphaVantageClient {
    fn source_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<String>> {
        let body: GlobalQuoteResponse = self.query("GLOBAL_QUOTE", ("symbol", symbol)).await?;

        let price = body.global_quote.price.trim();
        if price.is_empty() {
            return Ok(None);
        }
        Ok(Some(price.to_string()))
    }
}

#[async_trait::async_trait]
impl NewsSource for AlphaVantageClient {
    fn source_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_articles(&self, symbol: &str) -> Result<Vec<Article>> {
        let body: NewsSentimentResponse =
            self.query("NEWS_SENTIMENT", ("tickers", symbol)).await?;

        let articles = body
            .feed
            .into_iter()
            .map(|item| Article {
                url: item.url,
                published_at: parse_time_published(&item.time_published),
                sentiment: item.overall_sentiment_score,
            })
            .collect();
        Ok(articles)
    }
}

fn parse_time_published(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(t, TIME_PUBLISHED_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    global_quote: GlobalQuote,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price", default)]
    price: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NewsSentimentResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    time_published: String,
    #[serde(default)]
    overall_sentiment_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_global_quote_price_field() {
        let v = json!({
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "189.4300",
                "07. latest trading day": "2026-01-27"
            }
        });

        let body: GlobalQuoteResponse = serde_json::from_value(v).unwrap();
        assert_eq!(body.global_quote.price, "189.4300");
    }

    #[test]
    fn missing_quote_block_defaults_to_empty_price() {
        let body: GlobalQuoteResponse = serde_json::from_value(json!({})).unwrap();
        assert!(body.global_quote.price.is_empty());
    }

    #[test]
    fn parses_news_feed_items() {
        let v = json!({
            "items": "2",
            "feed": [
                {
                    "title": "Apple up",
                    "url": "https://news.example/apple-up",
                    "time_published": "20260127T093000",
                    "overall_sentiment_score": 0.31
                },
                {
                    "url": "https://news.example/no-timestamp",
                    "overall_sentiment_score": -0.12
                }
            ]
        });

        let body: NewsSentimentResponse = serde_json::from_value(v).unwrap();
        assert_eq!(body.feed.len(), 2);
        assert_eq!(body.feed[0].overall_sentiment_score, 0.31);

        let parsed = parse_time_published(&body.feed[0].time_published).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-27T09:30:00+00:00");
        assert_eq!(parse_time_published(&body.feed[1].time_published), None);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert_eq!(parse_time_published("yesterday"), None);
        assert_eq!(parse_time_published("2026-01-27 09:30:00"), None);
    }
}
