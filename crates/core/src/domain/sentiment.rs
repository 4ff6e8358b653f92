use crate::domain::record::SentimentFields;
use crate::fetch::types::Article;
use chrono::{DateTime, Duration, Utc};

/// Aggregates raw article sentiments into presentation fields.
///
/// Only articles published strictly within the trailing 24 hours of `now`
/// qualify; articles without a parseable timestamp are discarded. The mean of
/// the qualifying raw scores (range [-1, 1]) is remapped linearly to
/// [0, 100]. The single most bullish and most bearish articles with a
/// non-empty URL are tracked, first seen winning ties. With zero qualifying
/// articles the neutral default (score 50, empty links) is returned.
pub fn aggregate(articles: &[Article], now: DateTime<Utc>) -> SentimentFields {
    let mut scores: Vec<f64> = Vec::new();

    // Sentinels at the range edges: an extreme must strictly beat them, so a
    // raw score of exactly -1 or +1 never displaces an empty link.
    let mut bullish: (f64, &str) = (-1.0, "");
    let mut bearish: (f64, &str) = (1.0, "");

    for article in articles {
        let Some(published_at) = article.published_at else {
            continue;
        };
        if now.signed_duration_since(published_at) >= Duration::days(1) {
            continue;
        }

        scores.push(article.sentiment);

        if article.sentiment > bullish.0 && !article.url.is_empty() {
            bullish = (article.sentiment, &article.url);
        }
        if article.sentiment < bearish.0 && !article.url.is_empty() {
            bearish = (article.sentiment, &article.url);
        }
    }

    if scores.is_empty() {
        return SentimentFields::neutral();
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let sentiment_score = ((mean + 1.0) / 2.0 * 100.0).round() as i32;

    SentimentFields {
        sentiment_score,
        bullish_article: bullish.1.to_string(),
        bearish_article: bearish.1.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 27, 12, 0, 0).unwrap()
    }

    fn article(url: &str, hours_ago: i64, sentiment: f64) -> Article {
        Article {
            url: url.to_string(),
            published_at: Some(now() - Duration::hours(hours_ago)),
            sentiment,
        }
    }

    #[test]
    fn remaps_mean_of_qualifying_scores() {
        let articles = vec![
            article("https://a.example/1", 1, 0.2),
            article("https://a.example/2", 5, -0.4),
            article("https://a.example/3", 23, 0.6),
        ];

        let out = aggregate(&articles, now());
        // mean = 0.1333..., (mean + 1) / 2 * 100 = 56.66... -> 57
        assert_eq!(out.sentiment_score, 57);
        assert_eq!(out.bullish_article, "https://a.example/3");
        assert_eq!(out.bearish_article, "https://a.example/2");
    }

    #[test]
    fn neutral_default_when_nothing_qualifies() {
        let stale = vec![article("https://a.example/old", 48, 0.9)];
        assert_eq!(aggregate(&stale, now()), SentimentFields::neutral());
        assert_eq!(aggregate(&[], now()), SentimentFields::neutral());
    }

    #[test]
    fn exactly_24_hours_old_is_excluded() {
        let boundary = vec![article("https://a.example/b", 24, 0.9)];
        assert_eq!(aggregate(&boundary, now()), SentimentFields::neutral());
    }

    #[test]
    fn missing_timestamp_is_discarded() {
        let articles = vec![
            Article {
                url: "https://a.example/undated".to_string(),
                published_at: None,
                sentiment: 1.0,
            },
            article("https://a.example/dated", 2, 0.0),
        ];

        let out = aggregate(&articles, now());
        assert_eq!(out.sentiment_score, 50);
        assert_eq!(out.bullish_article, "");
    }

    #[test]
    fn first_seen_wins_ties() {
        let articles = vec![
            article("https://a.example/first", 1, 0.5),
            article("https://a.example/second", 2, 0.5),
        ];

        let out = aggregate(&articles, now());
        assert_eq!(out.bullish_article, "https://a.example/first");
    }

    #[test]
    fn url_less_articles_count_toward_mean_but_not_extremes() {
        let articles = vec![
            article("", 1, 0.8),
            article("https://a.example/mild", 2, 0.2),
        ];

        let out = aggregate(&articles, now());
        // mean = 0.5 -> 75, but the 0.8 article has no link to surface.
        assert_eq!(out.sentiment_score, 75);
        assert_eq!(out.bullish_article, "https://a.example/mild");
        assert_eq!(out.bearish_article, "https://a.example/mild");
    }
}
