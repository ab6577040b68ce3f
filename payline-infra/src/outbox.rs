//! Transactional outbox table access and the drain loop.
//!
//! Services that publish to the Log never do so from a request handler or
//! consumer directly. Instead they insert an `outbox_events` row inside the
//! same Store transaction as the business write, then nudge the drainer.
//! The drainer publishes pending rows to the Log and marks them published,
//! closing the gap between "state committed" and "event emitted": a crash
//! between commit and publish is repaired on the next drain pass. Publishing
//! before marking means a crash can publish twice, which consumers absorb
//! (at-least-once).

use std::time::Duration;

use payline_common::time::TimestampMs;
use payline_tokio::{notify, notify_once::NotifyOnce, task::Task};
use sqlx::{PgPool, Postgres, Row as _, Transaction};
use tracing::{debug, warn};

use crate::log::EventLog;

/// How many rows a single drain pass publishes at most.
const DRAIN_BATCH: i64 = 64;

/// An `outbox_events` row.
#[derive(Clone, Debug)]
pub struct OutboxEvent {
    pub id: i64,
    pub topic: String,
    pub partition_key: String,
    pub payload: String,
    pub created_at: TimestampMs,
    pub published_at: Option<TimestampMs>,
}

/// Insert an outbox row within the caller's Store transaction. The caller
/// commits the business write and the outbox row atomically.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    topic: &str,
    partition_key: &str,
    payload: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO outbox_events (topic, partition_key, payload, created_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(topic)
    .bind(partition_key)
    .bind(payload)
    .bind(TimestampMs::now().as_i64())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Fetch up to `limit` unpublished rows, oldest first.
pub async fn fetch_unpublished(
    db: &PgPool,
    limit: i64,
) -> Result<Vec<OutboxEvent>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, topic, partition_key, payload, created_at, published_at \
         FROM outbox_events WHERE published_at IS NULL ORDER BY id LIMIT $1",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(OutboxEvent {
                id: row.try_get("id")?,
                topic: row.try_get("topic")?,
                partition_key: row.try_get("partition_key")?,
                payload: row.try_get("payload")?,
                created_at: TimestampMs::try_from_i64(
                    row.try_get("created_at")?,
                )
                .unwrap_or_else(|_| TimestampMs::now()),
                published_at: row
                    .try_get::<Option<i64>, _>("published_at")?
                    .and_then(|ms| TimestampMs::try_from_i64(ms).ok()),
            })
        })
        .collect()
}

async fn mark_published(db: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE outbox_events SET published_at = $1 WHERE id = $2")
        .bind(TimestampMs::now().as_i64())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// One drain pass: publish a batch of pending rows and mark them published.
/// Returns how many rows were published.
async fn drain_batch(db: &PgPool, log: &EventLog) -> anyhow::Result<usize> {
    let events = fetch_unpublished(db, DRAIN_BATCH).await?;
    let drained = events.len();

    for event in events {
        log.publish(&event.topic, &event.partition_key, &event.payload)
            .await?;
        mark_published(db, event.id).await?;
        metrics::counter!("outbox_published_total", "topic" => event.topic)
            .increment(1);
    }

    Ok(drained)
}

/// Spawns the outbox drainer task. It drains on a fixed `interval`, and
/// immediately when nudged via the `wake` channel (the write paths nudge it
/// right after committing).
pub fn spawn_drainer(
    db: PgPool,
    log: EventLog,
    mut wake: notify::Receiver,
    mut shutdown: NotifyOnce,
    interval: Duration,
) -> Task<()> {
    Task::spawn("outbox drainer", async move {
        loop {
            tokio::select! {
                biased;
                () = shutdown.recv() => break,
                () = wake.recv() => (),
                () = tokio::time::sleep(interval) => (),
            }

            // Keep draining until the table is clean; an Upstream failure
            // ends the pass and the next tick retries from the oldest row.
            loop {
                match drain_batch(&db, &log).await {
                    Ok(0) => break,
                    Ok(drained) => debug!("Drained {drained} outbox rows"),
                    Err(e) => {
                        warn!("Outbox drain pass failed: {e:#}");
                        break;
                    }
                }
            }
        }
    })
}
