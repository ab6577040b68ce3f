//! KV cache, TTL locks, and velocity counters, backed by Redis.

use std::time::Duration;

use anyhow::Context as _;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("KV error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("KV value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A handle to the shared KV store. Cheap to clone; all clones share one
/// auto-reconnecting connection.
#[derive(Clone)]
pub struct Kv {
    conn: ConnectionManager,
}

impl Kv {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(redis_url).context("Invalid Redis URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Could not connect to Redis")?;
        Ok(Self { conn })
    }

    /// Fetch and JSON-decode a cached value.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, KvError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        value
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(KvError::from)
    }

    /// JSON-encode and cache a value with an expiry.
    pub async fn set_json_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, json, ttl.as_secs()).await?;
        Ok(())
    }

    /// Atomic "set if absent" with a TTL; the advisory lock primitive.
    /// Returns whether the lock was acquired.
    pub async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    /// Increment a sliding-window counter. The window TTL is attached when
    /// the counter is first created, so the count resets `window` after the
    /// first event, not the last.
    pub async fn incr_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, KvError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: bool = conn.expire(key, window.as_secs() as i64).await?;
        }
        Ok(count)
    }
}
