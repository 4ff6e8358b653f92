use anyhow::Context;
use uuid::Uuid;

// One table backs every queue; messages are claimed with SKIP LOCKED and
// become eligible for redelivery once their visibility window passes.
// Delivery is at-least-once by construction.
pub const PRICE_FETCH_QUEUE: &str = "price_fetch";
pub const SENTIMENT_FETCH_QUEUE: &str = "sentiment_fetch";
pub const STAGING_EVENTS_QUEUE: &str = "staging_events";

#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: Uuid,
    pub queue: String,
    pub payload: serde_json::Value,
    /// Delivery count including this one.
    pub attempts: i32,
}

pub async fn enqueue(
    pool: &sqlx::PgPool,
    queue: &str,
    payload: serde_json::Value,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO work_items (id, queue, payload) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(queue)
        .bind(payload)
        .execute(pool)
        .await
        .with_context(|| format!("enqueue to {queue} failed"))?;
    Ok(id)
}

/// Same as `enqueue` but inside an open transaction, so a data write and its
/// notification commit or roll back together.
pub async fn enqueue_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    queue: &str,
    payload: serde_json::Value,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO work_items (id, queue, payload) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(queue)
        .bind(payload)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("enqueue to {queue} failed"))?;
    Ok(id)
}

/// Claims up to `limit` due messages, pushing their visibility out by
/// `visibility_secs` and bumping the attempt count. Concurrent consumers of
/// the same queue never claim the same message inside one window.
pub async fn receive(
    pool: &sqlx::PgPool,
    queue: &str,
    limit: i64,
    visibility_secs: u64,
) -> anyhow::Result<Vec<QueueMessage>> {
    let rows = sqlx::query_as::<_, (Uuid, String, serde_json::Value, i32)>(
        "WITH due AS ( \
           SELECT id FROM work_items \
           WHERE queue = $1 AND visible_at <= now() \
           ORDER BY enqueued_at ASC \
           LIMIT $2 \
           FOR UPDATE SKIP LOCKED \
         ) \
         UPDATE work_items w \
         SET visible_at = now() + make_interval(secs => $3), \
             attempts = attempts + 1 \
         FROM due \
         WHERE w.id = due.id \
         RETURNING w.id, w.queue, w.payload, w.attempts",
    )
    .persistent(false)
    .bind(queue)
    .bind(limit)
    .bind(visibility_secs as f64)
    .fetch_all(pool)
    .await
    .with_context(|| format!("receive from {queue} failed"))?;

    Ok(rows
        .into_iter()
        .map(|(id, queue, payload, attempts)| QueueMessage {
            id,
            queue,
            payload,
            attempts,
        })
        .collect())
}

/// Removes a processed message. Acking an id that is already gone is a no-op,
/// which keeps retried batches harmless.
pub async fn ack(pool: &sqlx::PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM work_items WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("ack of work item {id} failed"))?;
    Ok(())
}
