use anyhow::Context;

/// Keyset-paginated scan of the symbol registry, ordered so repeated pages
/// never skip or repeat a symbol.
pub async fn list_page(
    pool: &sqlx::PgPool,
    after: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<String>> {
    let rows = match after {
        Some(last) => {
            sqlx::query_as::<_, (String,)>(
                "SELECT symbol FROM symbols WHERE symbol > $1 ORDER BY symbol ASC LIMIT $2",
            )
            .bind(last)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, (String,)>(
                "SELECT symbol FROM symbols ORDER BY symbol ASC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
    .context("scan symbols failed")?;

    Ok(rows.into_iter().map(|(s,)| s).collect())
}

/// Registers a symbol; returns false when it was already present.
pub async fn add(pool: &sqlx::PgPool, symbol: &str) -> anyhow::Result<bool> {
    let symbol = symbol.trim().to_uppercase();
    anyhow::ensure!(!symbol.is_empty(), "symbol must be non-empty");

    let res = sqlx::query("INSERT INTO symbols (symbol) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(&symbol)
        .execute(pool)
        .await
        .context("insert symbol failed")?;
    Ok(res.rows_affected() > 0)
}
