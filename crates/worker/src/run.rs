use anyhow::Result;
use quotefuse_core::fetch::alphavantage::AlphaVantageClient;
use quotefuse_core::pipeline::{fetch_step, reconcile, StepOutcome};
use quotefuse_core::storage::queue::{self, QueueMessage};
use sqlx::PgPool;
use std::time::Duration;

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Process a single batch and exit.
    #[arg(long)]
    pub once: bool,

    /// Messages claimed per poll.
    #[arg(long, default_value_t = 10)]
    pub batch_size: i64,

    /// Sleep between polls when the queue is empty.
    #[arg(long, default_value_t = 5)]
    pub poll_secs: u64,

    /// Visibility window for claimed messages.
    #[arg(long, default_value_t = 60)]
    pub visibility_secs: u64,

    /// Deliveries after which a message is dropped as poison.
    #[arg(long, default_value_t = 10)]
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Copy)]
pub enum FetcherRole {
    Price,
    Sentiment,
}

impl FetcherRole {
    fn queue(&self) -> &'static str {
        match self {
            FetcherRole::Price => queue::PRICE_FETCH_QUEUE,
            FetcherRole::Sentiment => queue::SENTIMENT_FETCH_QUEUE,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FetcherRole::Price => "price-fetcher",
            FetcherRole::Sentiment => "sentiment-fetcher",
        }
    }
}

pub async fn run_fetcher(
    pool: &PgPool,
    client: &AlphaVantageClient,
    role: FetcherRole,
    args: &RunArgs,
) -> Result<()> {
    tracing::info!(role = role.name(), queue = role.queue(), "worker starting");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let batch = queue::receive(pool, role.queue(), args.batch_size, args.visibility_secs).await?;
        let claimed = batch.len();

        for msg in batch {
            if drop_if_poison(pool, &msg, args.max_attempts).await? {
                continue;
            }

            let result = match role {
                FetcherRole::Price => fetch_step::process_price_item(pool, client, &msg).await,
                FetcherRole::Sentiment => {
                    fetch_step::process_sentiment_item(pool, client, &msg, chrono::Utc::now()).await
                }
            };

            match result {
                // Staged items are acked by the reconciler after the join;
                // deferred items redeliver once their visibility lapses.
                Ok(StepOutcome::Staged) | Ok(StepOutcome::Deferred) => {}
                Ok(StepOutcome::Dropped) => queue::ack(pool, msg.id).await?,
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(role = role.name(), item = %msg.id, error = %err, "work item failed; leaving for redelivery");
                }
            }
        }

        if args.once {
            return Ok(());
        }

        let idle = claimed == 0;
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(role = role.name(), "shutdown signal received");
                return Ok(());
            }
            _ = tokio::time::sleep(idle_backoff(idle, args.poll_secs)) => {}
        }
    }
}

pub async fn run_reconciler(pool: &PgPool, args: &RunArgs) -> Result<()> {
    tracing::info!(queue = queue::STAGING_EVENTS_QUEUE, "reconciler starting");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let mut batch = queue::receive(
            pool,
            queue::STAGING_EVENTS_QUEUE,
            args.batch_size,
            args.visibility_secs,
        )
        .await?;

        let mut kept = Vec::with_capacity(batch.len());
        for msg in batch.drain(..) {
            if !drop_if_poison(pool, &msg, args.max_attempts).await? {
                kept.push(msg);
            }
        }
        let claimed = kept.len();

        if !kept.is_empty() {
            match reconcile::process_event_batch(pool, &kept).await {
                Ok(outcome) => {
                    tracing::info!(
                        joined = outcome.joined,
                        already_joined = outcome.already_joined,
                        deferred = outcome.deferred,
                        dropped = outcome.dropped,
                        "reconcile batch complete"
                    );
                }
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %err, "reconcile batch failed; events will redeliver");
                }
            }
        }

        if args.once {
            return Ok(());
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
            _ = tokio::time::sleep(idle_backoff(claimed == 0, args.poll_secs)) => {}
        }
    }
}

async fn drop_if_poison(pool: &PgPool, msg: &QueueMessage, max_attempts: i32) -> Result<bool> {
    if msg.attempts <= max_attempts {
        return Ok(false);
    }
    tracing::error!(
        item = %msg.id,
        queue = %msg.queue,
        attempts = msg.attempts,
        "dropping poison message after too many deliveries"
    );
    queue::ack(pool, msg.id).await?;
    Ok(true)
}

fn idle_backoff(idle: bool, poll_secs: u64) -> Duration {
    if idle {
        Duration::from_secs(poll_secs)
    } else {
        Duration::from_millis(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_loops_poll_again_immediately() {
        assert_eq!(idle_backoff(false, 5), Duration::from_millis(0));
        assert_eq!(idle_backoff(true, 5), Duration::from_secs(5));
    }
}
