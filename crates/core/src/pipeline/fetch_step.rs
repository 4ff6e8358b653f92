use crate::domain::message::FetchRequest;
use crate::domain::record::{PriceFields, StagingFields};
use crate::domain::sentiment;
use crate::fetch::{NewsSource, PriceSource};
use crate::pipeline::StepOutcome;
use crate::storage::{queue::QueueMessage, staging};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Handles one price work item: fetch the latest quote and stage it.
///
/// Transport failures defer the item to redelivery; a response with no quote
/// drops it (the next dispatch run enqueues the symbol again). A successful
/// stage leaves the item unacked on purpose: the reconciler acks it once the
/// joined record exists.
pub async fn process_price_item(
    pool: &sqlx::PgPool,
    source: &dyn PriceSource,
    msg: &QueueMessage,
) -> Result<StepOutcome> {
    let Some(symbol) = parse_symbol(msg) else {
        return Ok(StepOutcome::Dropped);
    };

    let price = match source.fetch_price(&symbol).await {
        Ok(Some(price)) => price,
        Ok(None) => {
            tracing::warn!(%symbol, source = source.source_name(), "no price data for symbol");
            return Ok(StepOutcome::Dropped);
        }
        Err(err) => {
            tracing::warn!(%symbol, source = source.source_name(), error = %err, "price fetch failed; leaving item for redelivery");
            return Ok(StepOutcome::Deferred);
        }
    };

    staging::put(
        pool,
        &symbol,
        &StagingFields::Price(PriceFields { price }),
        Some(msg.id),
    )
    .await?;

    tracing::info!(%symbol, "staged price record");
    Ok(StepOutcome::Staged)
}

/// Handles one sentiment work item: fetch the news feed, aggregate, stage.
///
/// A failed fetch is treated identically to an empty feed: the neutral
/// default is staged anyway, because the completeness check needs both kinds
/// to exist before it can join.
pub async fn process_sentiment_item(
    pool: &sqlx::PgPool,
    source: &dyn NewsSource,
    msg: &QueueMessage,
    now: DateTime<Utc>,
) -> Result<StepOutcome> {
    let Some(symbol) = parse_symbol(msg) else {
        return Ok(StepOutcome::Dropped);
    };

    let articles = match source.fetch_articles(&symbol).await {
        Ok(articles) => articles,
        Err(err) => {
            tracing::warn!(%symbol, source = source.source_name(), error = %err, "sentiment fetch failed; staging neutral default");
            Vec::new()
        }
    };

    let fields = sentiment::aggregate(&articles, now);
    tracing::debug!(
        %symbol,
        articles = articles.len(),
        score = fields.sentiment_score,
        "aggregated sentiment"
    );

    staging::put(pool, &symbol, &StagingFields::Sentiment(fields), Some(msg.id)).await?;

    tracing::info!(%symbol, "staged sentiment record");
    Ok(StepOutcome::Staged)
}

fn parse_symbol(msg: &QueueMessage) -> Option<String> {
    let req = match serde_json::from_value::<FetchRequest>(msg.payload.clone()) {
        Ok(req) => req,
        Err(err) => {
            tracing::error!(item = %msg.id, error = %err, "invalid fetch work item body; dropping");
            return None;
        }
    };

    // Uppercase here so staged keys always match the reader's lookup case.
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        tracing::error!(item = %msg.id, "symbol is missing in work item; dropping");
        return None;
    }
    Some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn msg(payload: serde_json::Value) -> QueueMessage {
        QueueMessage {
            id: Uuid::new_v4(),
            queue: "price_fetch".to_string(),
            payload,
            attempts: 1,
        }
    }

    #[test]
    fn extracts_trimmed_uppercased_symbol() {
        assert_eq!(
            parse_symbol(&msg(json!({"symbol": " aapl "}))).as_deref(),
            Some("AAPL")
        );
    }

    #[test]
    fn rejects_missing_or_blank_symbol() {
        assert_eq!(parse_symbol(&msg(json!({"symbol": ""}))), None);
        assert_eq!(parse_symbol(&msg(json!({"ticker": "AAPL"}))), None);
        assert_eq!(parse_symbol(&msg(json!("not an object"))), None);
    }
}
