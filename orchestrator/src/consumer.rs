//! The `payment.created` consumer loop.

use std::time::Duration;

use payline_common::event::PaymentCreated;
use payline_infra::log::{decode_payload, ConsumeError, LogConsumer};
use payline_tokio::{notify_once::NotifyOnce, task::Task};
use tracing::{debug, warn};

use crate::engine::Engine;

/// How many entries one read pulls at most.
const READ_COUNT: usize = 16;
/// Server-side block time per read; bounds shutdown latency.
const READ_BLOCK: Duration = Duration::from_secs(1);
/// Pause before replaying entries that failed with a retryable error.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub fn spawn_consumer(
    mut consumer: LogConsumer,
    engine: Engine,
    shutdown: NotifyOnce,
) -> Task<()> {
    Task::spawn("payment.created consumer", async move {
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
                let event = match decode_payload::<PaymentCreated>(&entry) {
                    Ok(event) => event,
                    Err(ConsumeError::Discard(e)) => {
                        warn!("Discarding {}: {e:#}", entry.id);
                        if let Err(e) =
                            consumer.dead_letter(&entry, "malformed").await
                        {
                            warn!("Dead-letter failed: {e:#}");
                        }
                        ack(&mut consumer, &entry.id).await;
                        continue;
                    }
                    Err(ConsumeError::Retry(e)) => {
                        warn!("Will redeliver {}: {e:#}", entry.id);
                        left_pending = true;
                        continue;
                    }
                };

                match engine.handle_payment_created(&event).await {
                    Ok(()) => {
                        debug!("Processed {}", entry.id);
                        ack(&mut consumer, &entry.id).await;
                    }
                    // Offset not advanced: the entry stays pending and is
                    // redelivered.
                    Err(ConsumeError::Retry(e)) => {
                        warn!("Will redeliver {}: {e:#}", entry.id);
                        left_pending = true;
                    }
                    Err(ConsumeError::Discard(e)) => {
                        warn!("Discarding {}: {e:#}", entry.id);
                        if let Err(e) =
                            consumer.dead_letter(&entry, "not processable").await
                        {
                            warn!("Dead-letter failed: {e:#}");
                        }
                        ack(&mut consumer, &entry.id).await;
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

async fn ack(consumer: &mut LogConsumer, entry_id: &str) {
    if let Err(e) = consumer.ack(entry_id).await {
        // Not fatal: the entry will be redelivered and absorbed by the CAS.
        warn!("Ack failed for {entry_id}: {e:#}");
    }
}
