use crate::domain::message::{ChangeKind, StagingEvent};
use crate::domain::record::{FinalRecord, PriceFields, SentimentFields, StagingKind};
use crate::storage::{final_records, queue, queue::QueueMessage, staging};
use crate::time;
use anyhow::Result;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Symbols joined into a final record by this batch.
    pub joined: usize,
    /// Events whose symbol was found already joined for today.
    pub already_joined: usize,
    /// Events left unacked because the pair is not yet complete.
    pub deferred: usize,
    /// Malformed or unrecognized events removed from the queue.
    pub dropped: usize,
}

/// What to do with one staging change event, given the freshly read state.
#[derive(Debug, Clone, PartialEq)]
enum EventAction {
    /// Both halves are staged: write the final record, delete the staging
    /// rows, ack the source work item and the event.
    Join(PriceFields, SentimentFields),
    /// The join already exists (earlier in this batch, or a previous attempt
    /// that died before acking); just ack.
    AckJoined,
    /// Pair incomplete and no final record yet: leave the event queued so the
    /// other fetcher's write can complete the join. Nothing is deleted.
    Defer,
}

fn decide(
    price: Option<PriceFields>,
    sentiment: Option<SentimentFields>,
    final_exists: bool,
    already_processed: bool,
) -> EventAction {
    if already_processed {
        return EventAction::AckJoined;
    }
    match (price, sentiment) {
        (Some(price), Some(sentiment)) => EventAction::Join(price, sentiment),
        _ if final_exists => EventAction::AckJoined,
        _ => EventAction::Defer,
    }
}

/// Processes one batch of staging change events.
///
/// Per event: derive the base symbol from the staged key, read both staging
/// halves fresh from the store, and when the pair is complete write today's
/// final record, delete both staging rows, and ack the originating fetch work
/// item. An incomplete pair is not an error; the event stays queued and the
/// other fetcher's write will complete the join. Store failures propagate and
/// fail the whole batch, which simply redelivers later.
///
/// Within a batch each base symbol is reconciled at most once; a symbol's
/// second event (both halves landing together) rides the already-joined path.
pub async fn process_event_batch(
    pool: &sqlx::PgPool,
    batch: &[QueueMessage],
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let mut processed: HashSet<String> = HashSet::new();

    for msg in batch {
        let event = match serde_json::from_value::<StagingEvent>(msg.payload.clone()) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(item = %msg.id, error = %err, "invalid staging event body; dropping");
                queue::ack(pool, msg.id).await?;
                outcome.dropped += 1;
                continue;
            }
        };

        // Deletions are the reconciler's own cleanup echoing back.
        if event.event == ChangeKind::Delete {
            queue::ack(pool, msg.id).await?;
            outcome.dropped += 1;
            continue;
        }

        let Some((_, symbol)) = StagingKind::parse_record_key(&event.record_key) else {
            tracing::warn!(key = %event.record_key, "staged key matches no known prefix; ignoring");
            queue::ack(pool, msg.id).await?;
            outcome.dropped += 1;
            continue;
        };
        let symbol = symbol.to_string();

        let already_processed = processed.contains(&symbol);
        let (price, sentiment, final_exists) = if already_processed {
            // Joined earlier in this batch; skip the reads.
            (None, None, false)
        } else {
            let price = staging::get_price(pool, &symbol).await?;
            let sentiment = staging::get_sentiment(pool, &symbol).await?;
            let final_exists = if price.is_none() || sentiment.is_none() {
                final_records::exists(pool, &symbol, time::today_utc()).await?
            } else {
                false
            };
            (price, sentiment, final_exists)
        };

        match decide(price, sentiment, final_exists, already_processed) {
            EventAction::Join(price, sentiment) => {
                let record = FinalRecord {
                    symbol: symbol.clone(),
                    as_of_date: time::today_utc(),
                    price: price.price,
                    sentiment_score: sentiment.sentiment_score,
                    bullish_article: sentiment.bullish_article,
                    bearish_article: sentiment.bearish_article,
                };

                final_records::put(pool, &record).await?;
                staging::delete(pool, StagingKind::Price, &symbol).await?;
                staging::delete(pool, StagingKind::Sentiment, &symbol).await?;
                finish_as_joined(pool, msg.id, event.source_item).await?;

                tracing::info!(%symbol, date = %record.as_of_date, score = record.sentiment_score, "joined final record");
                processed.insert(symbol);
                outcome.joined += 1;
            }
            EventAction::AckJoined => {
                finish_as_joined(pool, msg.id, event.source_item).await?;
                processed.insert(symbol);
                outcome.already_joined += 1;
            }
            EventAction::Defer => {
                tracing::debug!(%symbol, "staging incomplete; deferring until the other kind arrives");
                outcome.deferred += 1;
            }
        }
    }

    Ok(outcome)
}

async fn finish_as_joined(
    pool: &sqlx::PgPool,
    event_id: Uuid,
    source_item: Option<Uuid>,
) -> Result<()> {
    if let Some(item) = source_item {
        queue::ack(pool, item).await?;
    }
    queue::ack(pool, event_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price() -> PriceFields {
        PriceFields {
            price: "189.4300".to_string(),
        }
    }

    fn sentiment() -> SentimentFields {
        SentimentFields {
            sentiment_score: 57,
            bullish_article: "https://news.example/up".to_string(),
            bearish_article: "https://news.example/down".to_string(),
        }
    }

    #[test]
    fn complete_pair_joins_with_staged_fields() {
        let action = decide(Some(price()), Some(sentiment()), false, false);
        assert_eq!(action, EventAction::Join(price(), sentiment()));
    }

    #[test]
    fn lone_price_record_defers_and_touches_nothing() {
        // The completeness gate: one staged half must not produce a final
        // record, and only the Join action ever deletes staging rows.
        assert_eq!(decide(Some(price()), None, false, false), EventAction::Defer);
        assert_eq!(
            decide(None, Some(sentiment()), false, false),
            EventAction::Defer
        );
        assert_eq!(decide(None, None, false, false), EventAction::Defer);
    }

    #[test]
    fn retry_after_cleanup_is_a_harmless_ack() {
        // Staging rows already deleted by a prior attempt that died before
        // acking; the existing final record marks the pair as joined.
        assert_eq!(decide(None, None, true, false), EventAction::AckJoined);
        assert_eq!(
            decide(Some(price()), None, true, false),
            EventAction::AckJoined
        );
    }

    #[test]
    fn second_event_for_a_symbol_in_one_batch_is_not_rejoined() {
        // Both halves landing in the same batch: the first event joins, the
        // second rides the already-joined path regardless of staging state.
        assert_eq!(decide(None, None, false, true), EventAction::AckJoined);
        assert_eq!(
            decide(Some(price()), Some(sentiment()), false, true),
            EventAction::AckJoined
        );
    }
}
