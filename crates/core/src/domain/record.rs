use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which half of a symbol's staged pair a record holds. The kind is a tag
/// carried in the staging key (`price_AAPL`, `sentiment_AAPL`), not a type
/// hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingKind {
    Price,
    Sentiment,
}

impl StagingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingKind::Price => "price",
            StagingKind::Sentiment => "sentiment",
        }
    }

    pub fn record_key(&self, symbol: &str) -> String {
        format!("{}_{symbol}", self.as_str())
    }

    /// Splits a staged key back into (kind, base symbol). Keys matching
    /// neither prefix, or with nothing after the prefix, yield `None`.
    pub fn parse_record_key(key: &str) -> Option<(StagingKind, &str)> {
        if let Some(rest) = key.strip_prefix("price_") {
            return (!rest.is_empty()).then_some((StagingKind::Price, rest));
        }
        if let Some(rest) = key.strip_prefix("sentiment_") {
            return (!rest.is_empty()).then_some((StagingKind::Sentiment, rest));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFields {
    /// Latest quote, kept as the decimal string the source returned.
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentFields {
    /// Aggregate score remapped from raw [-1, 1] to [0, 100].
    pub sentiment_score: i32,
    /// Link to the most bullish qualifying article, or empty.
    pub bullish_article: String,
    /// Link to the most bearish qualifying article, or empty.
    pub bearish_article: String,
}

impl SentimentFields {
    /// Fallback when no qualifying articles exist or the fetch failed.
    pub fn neutral() -> Self {
        Self {
            sentiment_score: 50,
            bullish_article: String::new(),
            bearish_article: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StagingFields {
    Price(PriceFields),
    Sentiment(SentimentFields),
}

impl StagingFields {
    pub fn kind(&self) -> StagingKind {
        match self {
            StagingFields::Price(_) => StagingKind::Price,
            StagingFields::Sentiment(_) => StagingKind::Sentiment,
        }
    }
}

/// The durable artifact: one joined record per symbol per UTC day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalRecord {
    pub symbol: String,
    pub as_of_date: NaiveDate,
    pub price: String,
    pub sentiment_score: i32,
    pub bullish_article: String,
    pub bearish_article: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_round_trips_per_kind() {
        assert_eq!(StagingKind::Price.record_key("AAPL"), "price_AAPL");
        assert_eq!(
            StagingKind::parse_record_key("price_AAPL"),
            Some((StagingKind::Price, "AAPL"))
        );
        assert_eq!(
            StagingKind::parse_record_key("sentiment_MSFT"),
            Some((StagingKind::Sentiment, "MSFT"))
        );
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        assert_eq!(StagingKind::parse_record_key("final_AAPL"), None);
        assert_eq!(StagingKind::parse_record_key("AAPL"), None);
        assert_eq!(StagingKind::parse_record_key("price_"), None);
    }

    #[test]
    fn prefix_match_is_exact_not_substring() {
        // A symbol that itself contains a prefix-like chunk keeps its tail.
        assert_eq!(
            StagingKind::parse_record_key("price_sentiment_X"),
            Some((StagingKind::Price, "sentiment_X"))
        );
    }
}
