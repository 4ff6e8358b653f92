use crate::domain::message::FetchRequest;
use crate::storage::{queue, symbols};
use anyhow::{Context, Result};

const PAGE_SIZE: i64 = 500;

/// Fans the symbol registry out to both fetch queues. Pure enumeration with
/// a duplication side effect; at-least-once delivery downstream makes
/// overlapping dispatch runs harmless.
pub async fn dispatch_symbols(pool: &sqlx::PgPool) -> Result<u64> {
    let mut after: Option<String> = None;
    let mut enqueued: u64 = 0;

    loop {
        let page = symbols::list_page(pool, after.as_deref(), PAGE_SIZE).await?;
        let Some(last) = page.last().cloned() else {
            break;
        };

        for symbol in page {
            let payload = serde_json::to_value(FetchRequest { symbol })
                .context("serialize fetch request failed")?;
            queue::enqueue(pool, queue::PRICE_FETCH_QUEUE, payload.clone()).await?;
            queue::enqueue(pool, queue::SENTIMENT_FETCH_QUEUE, payload).await?;
            enqueued += 2;
        }

        after = Some(last);
    }

    tracing::info!(enqueued, "dispatched symbols to fetch queues");
    Ok(enqueued)
}
