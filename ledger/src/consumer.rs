//! The `payment.state.changed` consumer loop.

use std::time::Duration;

use payline_common::{event::PaymentStateChanged, payment::PaymentState};
use payline_infra::log::{decode_payload, ConsumeError, LogConsumer};
use payline_tokio::{notify_once::NotifyOnce, task::Task};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::{
    posting,
    store::{self, PostError, PostOutcome},
};

/// How many entries one read pulls at most.
const READ_COUNT: usize = 16;
/// Server-side block time per read; bounds shutdown latency.
const READ_BLOCK: Duration = Duration::from_secs(1);
/// Pause before replaying entries that failed with a retryable error.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub fn spawn_consumer(
    mut consumer: LogConsumer,
    db: PgPool,
    shutdown: NotifyOnce,
) -> Task<()> {
    Task::spawn("payment.state.changed consumer", async move {
        loop {
            if shutdown.try_recv() {
                break;
            }

            let entries = match consumer.read_batch(READ_COUNT, READ_BLOCK).await
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Log read failed: {e:#}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let mut left_pending = false;
            for entry in entries {
                let outcome = handle(&db, &entry).await;
                match outcome {
                    Ok(()) => {
                        if let Err(e) = consumer.ack(&entry.id).await {
                            warn!("Ack failed for {}: {e:#}", entry.id);
                        }
                    }
                    // Offset not advanced: redelivered, absorbed by the
                    // unique idempotency keys.
                    Err(ConsumeError::Retry(e)) => {
                        warn!("Will redeliver {}: {e:#}", entry.id);
                        left_pending = true;
                    }
                    Err(ConsumeError::Discard(e)) => {
                        warn!("Discarding {}: {e:#}", entry.id);
                        if let Err(e) =
                            consumer.dead_letter(&entry, "not postable").await
                        {
                            warn!("Dead-letter failed: {e:#}");
                        }
                        if let Err(e) = consumer.ack(&entry.id).await {
                            warn!("Ack failed for {}: {e:#}", entry.id);
                        }
                    }
                }
            }

            if left_pending {
                // Back off briefly, then replay the un-acked entries.
                tokio::time::sleep(RETRY_BACKOFF).await;
                consumer.rewind_pending();
            }
        }
    })
}

async fn handle(
    db: &PgPool,
    entry: &payline_infra::log::LogEntry,
) -> Result<(), ConsumeError> {
    let event = decode_payload::<PaymentStateChanged>(entry)?;

    // Only terminal success has a financial effect.
    if event.state != PaymentState::Succeeded {
        debug!(
            "No posting for {} ({} -> {})",
            event.payment_id, event.previous_state, event.state
        );
        return Ok(());
    }

    let group = posting::posting_group(&event);
    if group.is_empty() {
        return Ok(());
    }

    match store::post_group(db, &event, &group).await {
        Ok(PostOutcome::Posted) => {
            info!(
                "Posted {} entries for {} ({})",
                group.len(),
                event.payment_id,
                event.amount
            );
            metrics::counter!("ledger_entries_posted_total")
                .increment(group.len() as u64);
            Ok(())
        }
        Ok(PostOutcome::AlreadyPosted) => {
            debug!("Duplicate SUCCEEDED for {}", event.payment_id);
            Ok(())
        }
        // A balance violation cannot succeed on retry; park it in the DLQ
        // for a human.
        Err(e @ PostError::NegativeBalance { .. }) =>
            Err(ConsumeError::discard(e)),
        Err(PostError::Store(e)) => Err(ConsumeError::retry(e)),
        Err(PostError::Data(e)) => Err(ConsumeError::retry(e)),
    }
}
