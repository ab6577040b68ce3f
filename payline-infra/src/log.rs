//! The ordered, at-least-once event log, realized on Redis Streams.
//!
//! Each Log topic is one stream; entries carry the partition key (the
//! payment id) and a JSON payload. Consumers read through a per-service
//! consumer group with explicit acks: an entry whose processing fails is
//! simply not acked and stays in the consumer's pending list, from which it
//! is replayed on the next startup — the at-least-once contract. A single
//! stream is totally ordered, which subsumes the per-key ordering guarantee.

use std::time::Duration;

use anyhow::{anyhow, Context as _};
use redis::{
    aio::ConnectionManager,
    streams::{StreamReadOptions, StreamReadReply},
    AsyncCommands,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Malformed log entry {id}: missing {field}")]
    Malformed { id: String, field: &'static str },
}

/// How a consumer's processing of a [`LogEntry`] failed.
///
/// - `Retry`: a dependency failed; do NOT ack, so the entry is redelivered.
/// - `Discard`: the entry itself is bad or the operation is a stale
///   duplicate; ack it (optionally after dead-lettering) and move on.
#[derive(Debug)]
pub enum ConsumeError {
    Retry(anyhow::Error),
    Discard(anyhow::Error),
}

impl ConsumeError {
    pub fn retry(error: impl Into<anyhow::Error>) -> Self {
        Self::Retry(error.into())
    }

    pub fn discard(error: impl Into<anyhow::Error>) -> Self {
        Self::Discard(error.into())
    }
}

/// A single Log entry as seen by a consumer.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// The stream-assigned entry id, used for acking.
    pub id: String,
    /// The partition key (payment id).
    pub key: String,
    /// The JSON payload.
    pub payload: String,
}

// --- EventLog (producer) --- //

/// A publishing handle to the Log. Used by the outbox drainers.
#[derive(Clone)]
pub struct EventLog {
    conn: ConnectionManager,
}

impl EventLog {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(redis_url).context("Invalid Redis URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Could not connect to Redis for the Log")?;
        Ok(Self { conn })
    }

    /// Append an entry to `topic`. Returns the stream-assigned entry id.
    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<String, LogError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(topic, "*", &[("key", key), ("payload", payload)])
            .await?;
        debug!("Published {topic} key={key} id={id}");
        Ok(id)
    }
}

// --- LogConsumer --- //

/// A consumer-group reader for one Log topic.
///
/// Holds its own connection: group reads use server-side blocking, which
/// must not stall the multiplexed connections used elsewhere. The consumer
/// name is stable per service so that un-acked entries from a previous
/// incarnation are replayed from the pending list before new entries are
/// read.
pub struct LogConsumer {
    conn: ConnectionManager,
    topic: String,
    group: String,
    consumer: String,
    replayed_pending: bool,
}

impl LogConsumer {
    pub async fn connect(
        redis_url: &str,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(redis_url).context("Invalid Redis URL")?;
        let mut conn = ConnectionManager::new(client)
            .await
            .context("Could not connect to Redis for the Log")?;

        // Create the consumer group (and the stream, if it doesn't exist
        // yet). An already-existing group is fine.
        let created: Result<String, redis::RedisError> =
            conn.xgroup_create_mkstream(topic, group, "$").await;
        match created {
            Ok(_) => info!("Created consumer group {group} on {topic}"),
            Err(e) if e.code() == Some("BUSYGROUP") =>
                debug!("Consumer group {group} on {topic} already exists"),
            Err(e) =>
                return Err(e).context("Could not create consumer group"),
        }

        Ok(Self {
            conn,
            topic: topic.to_owned(),
            group: group.to_owned(),
            consumer: consumer.to_owned(),
            replayed_pending: false,
        })
    }

    /// Read the next batch of entries, blocking server-side for up to
    /// `block`. The first reads after startup replay this consumer's
    /// pending (delivered but never acked) entries.
    pub async fn read_batch(
        &mut self,
        count: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>, LogError> {
        let read_id = if self.replayed_pending { ">" } else { "0" };
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let reply: StreamReadReply = self
            .conn
            .xread_options(&[&self.topic], &[read_id], &options)
            .await?;

        let mut entries = Vec::new();
        for stream_key in reply.keys {
            for stream_id in stream_key.ids {
                let id = stream_id.id.clone();
                let key: String = stream_id.get("key").ok_or(
                    LogError::Malformed {
                        id: id.clone(),
                        field: "key",
                    },
                )?;
                let payload: String = stream_id.get("payload").ok_or(
                    LogError::Malformed {
                        id: id.clone(),
                        field: "payload",
                    },
                )?;
                entries.push(LogEntry { id, key, payload });
            }
        }

        if !self.replayed_pending && entries.is_empty() {
            // The pending list is drained; switch to reading new entries.
            self.replayed_pending = true;
        }

        Ok(entries)
    }

    /// Make the next read replay this consumer's pending (delivered but
    /// un-acked) entries before any new ones. Called after a batch left
    /// retryable entries behind, so "offset not advanced" actually means
    /// redelivery within this incarnation, not just after a restart.
    pub fn rewind_pending(&mut self) {
        self.replayed_pending = false;
    }

    /// Acknowledge an entry, advancing this group's offset past it.
    pub async fn ack(&mut self, entry_id: &str) -> Result<(), LogError> {
        let _: i64 = self
            .conn
            .xack(&self.topic, &self.group, &[entry_id])
            .await?;
        Ok(())
    }

    /// Append a non-retryable entry to the topic's dead-letter stream.
    /// The caller still acks the original entry afterwards.
    pub async fn dead_letter(
        &mut self,
        entry: &LogEntry,
        reason: &str,
    ) -> Result<(), LogError> {
        let dlq_topic = format!("{}.dlq", self.topic);
        let _: String = self
            .conn
            .xadd(
                &dlq_topic,
                "*",
                &[
                    ("key", entry.key.as_str()),
                    ("payload", entry.payload.as_str()),
                    ("reason", reason),
                ],
            )
            .await?;
        Ok(())
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Decode a [`LogEntry`] payload. A payload that fails to parse is a
/// `Discard`, not a `Retry`; retrying a malformed payload can never succeed.
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    entry: &LogEntry,
) -> Result<T, ConsumeError> {
    serde_json::from_str(&entry.payload).map_err(|e| {
        ConsumeError::discard(anyhow!(
            "Malformed payload in entry {}: {e}",
            entry.id
        ))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_payload_classifies_malformed_as_discard() {
        let entry = LogEntry {
            id: "1-0".to_owned(),
            key: "pay_x".to_owned(),
            payload: "{not json".to_owned(),
        };
        let result: Result<serde_json::Value, ConsumeError> =
            decode_payload(&entry);
        assert!(matches!(result, Err(ConsumeError::Discard(_))));
    }

    #[test]
    fn decode_payload_parses_valid_json() {
        let entry = LogEntry {
            id: "1-0".to_owned(),
            key: "pay_x".to_owned(),
            payload: r#"{"a": 1}"#.to_owned(),
        };
        let value: serde_json::Value = decode_payload(&entry).unwrap();
        assert_eq!(value["a"], 1);
    }
}
