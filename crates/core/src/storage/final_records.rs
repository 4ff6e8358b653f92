use crate::domain::record::FinalRecord;
use anyhow::Context;
use chrono::NaiveDate;

/// Idempotent write: reconciling the same complete pair twice overwrites the
/// day's record with the same values instead of failing.
pub async fn put(pool: &sqlx::PgPool, record: &FinalRecord) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO final_records \
           (symbol, as_of_date, price, sentiment_score, bullish_article, bearish_article) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (symbol, as_of_date) DO UPDATE SET \
           price = EXCLUDED.price, \
           sentiment_score = EXCLUDED.sentiment_score, \
           bullish_article = EXCLUDED.bullish_article, \
           bearish_article = EXCLUDED.bearish_article",
    )
    .bind(&record.symbol)
    .bind(record.as_of_date)
    .bind(&record.price)
    .bind(record.sentiment_score)
    .bind(&record.bullish_article)
    .bind(&record.bearish_article)
    .execute(pool)
    .await
    .context("upsert final_records failed")?;
    Ok(())
}

pub async fn query(
    pool: &sqlx::PgPool,
    symbol: &str,
    as_of_date: NaiveDate,
) -> anyhow::Result<Option<FinalRecord>> {
    // The primary key makes more than one row impossible, but order anyway so
    // a surprising storage state still yields the oldest row deterministically.
    let row = sqlx::query_as::<_, (String, NaiveDate, String, i32, String, String)>(
        "SELECT symbol, as_of_date, price, sentiment_score, bullish_article, bearish_article \
         FROM final_records \
         WHERE symbol = $1 AND as_of_date = $2 \
         ORDER BY created_at ASC \
         LIMIT 1",
    )
    .bind(symbol)
    .bind(as_of_date)
    .fetch_optional(pool)
    .await
    .context("query final_records failed")?;

    Ok(row.map(
        |(symbol, as_of_date, price, sentiment_score, bullish_article, bearish_article)| {
            FinalRecord {
                symbol,
                as_of_date,
                price,
                sentiment_score,
                bullish_article,
                bearish_article,
            }
        },
    ))
}

pub async fn exists(
    pool: &sqlx::PgPool,
    symbol: &str,
    as_of_date: NaiveDate,
) -> anyhow::Result<bool> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM final_records WHERE symbol = $1 AND as_of_date = $2)",
    )
    .bind(symbol)
    .bind(as_of_date)
    .fetch_one(pool)
    .await
    .context("final_records existence check failed")?;
    Ok(row.0)
}
