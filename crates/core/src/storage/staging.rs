use crate::domain::message::{ChangeKind, StagingEvent};
use crate::domain::record::{PriceFields, SentimentFields, StagingFields, StagingKind};
use crate::storage::queue;
use anyhow::Context;
use uuid::Uuid;

/// Upserts one staged half for `symbol` and, in the same transaction,
/// enqueues the change event that triggers reconciliation. Whichever of the
/// two fetchers writes second is the one whose event finds a complete pair.
pub async fn put(
    pool: &sqlx::PgPool,
    symbol: &str,
    fields: &StagingFields,
    source_item: Option<Uuid>,
) -> anyhow::Result<ChangeKind> {
    let kind = fields.kind();
    let record_key = kind.record_key(symbol);

    let (price, sentiment) = match fields {
        StagingFields::Price(p) => (Some(p.price.as_str()), None),
        StagingFields::Sentiment(s) => (None, Some(s)),
    };

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    // xmax = 0 distinguishes a fresh insert from an overwrite.
    let (inserted,): (bool,) = sqlx::query_as(
        "INSERT INTO staging_records \
           (record_key, kind, price, sentiment_score, bullish_article, bearish_article, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, now()) \
         ON CONFLICT (record_key) DO UPDATE SET \
           kind = EXCLUDED.kind, \
           price = EXCLUDED.price, \
           sentiment_score = EXCLUDED.sentiment_score, \
           bullish_article = EXCLUDED.bullish_article, \
           bearish_article = EXCLUDED.bearish_article, \
           updated_at = now() \
         RETURNING (xmax = 0)",
    )
    .persistent(false)
    .bind(&record_key)
    .bind(kind.as_str())
    .bind(price)
    .bind(sentiment.map(|s| s.sentiment_score))
    .bind(sentiment.map(|s| s.bullish_article.as_str()))
    .bind(sentiment.map(|s| s.bearish_article.as_str()))
    .fetch_one(&mut *tx)
    .await
    .context("upsert staging_records failed")?;

    let event = if inserted {
        ChangeKind::Insert
    } else {
        ChangeKind::Modify
    };

    let payload = serde_json::to_value(StagingEvent {
        record_key,
        kind,
        event,
        source_item,
    })
    .context("serialize staging event failed")?;
    queue::enqueue_tx(&mut tx, queue::STAGING_EVENTS_QUEUE, payload).await?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(event)
}

pub async fn get_price(
    pool: &sqlx::PgPool,
    symbol: &str,
) -> anyhow::Result<Option<PriceFields>> {
    let row = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT price FROM staging_records WHERE record_key = $1 AND kind = 'price'",
    )
    .bind(StagingKind::Price.record_key(symbol))
    .fetch_optional(pool)
    .await
    .context("read price staging record failed")?;

    let Some((Some(price),)) = row else {
        return Ok(None);
    };
    Ok(Some(PriceFields { price }))
}

pub async fn get_sentiment(
    pool: &sqlx::PgPool,
    symbol: &str,
) -> anyhow::Result<Option<SentimentFields>> {
    let row = sqlx::query_as::<_, (Option<i32>, Option<String>, Option<String>)>(
        "SELECT sentiment_score, bullish_article, bearish_article \
         FROM staging_records WHERE record_key = $1 AND kind = 'sentiment'",
    )
    .bind(StagingKind::Sentiment.record_key(symbol))
    .fetch_optional(pool)
    .await
    .context("read sentiment staging record failed")?;

    let Some((Some(sentiment_score), bullish_article, bearish_article)) = row else {
        return Ok(None);
    };
    Ok(Some(SentimentFields {
        sentiment_score,
        bullish_article: bullish_article.unwrap_or_default(),
        bearish_article: bearish_article.unwrap_or_default(),
    }))
}

pub async fn delete(pool: &sqlx::PgPool, kind: StagingKind, symbol: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM staging_records WHERE record_key = $1")
        .bind(kind.record_key(symbol))
        .execute(pool)
        .await
        .with_context(|| format!("delete {} staging record failed", kind.as_str()))?;
    Ok(())
}
