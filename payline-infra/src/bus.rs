//! The fire-and-forget request/reply bus, backed by NATS.
//!
//! There is no durability here: a request that nobody answers within its
//! deadline is a [`BusError::Timeout`], and the caller decides what that
//! means (for fraud consultation: a deterministic FAILED).

use std::{io, time::Duration};

use anyhow::Context as _;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus request failed: {0}")]
    Request(#[source] io::Error),
    #[error("Bus reply deadline exceeded")]
    Timeout,
    #[error("Bus payload could not be encoded/decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A handle to the Bus. Cheap to clone.
#[derive(Clone)]
pub struct Bus {
    conn: nats::asynk::Connection,
}

impl Bus {
    pub async fn connect(nats_url: &str) -> anyhow::Result<Self> {
        let conn = nats::asynk::connect(nats_url)
            .await
            .context("Could not connect to NATS")?;
        Ok(Self { conn })
    }

    /// Issue a JSON request on `subject` and await the JSON reply, with a
    /// deadline.
    pub async fn request_json<Req, Reply>(
        &self,
        subject: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Reply, BusError>
    where
        Req: Serialize,
        Reply: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;
        let message =
            tokio::time::timeout(timeout, self.conn.request(subject, payload))
                .await
                .map_err(|_| BusError::Timeout)?
                .map_err(BusError::Request)?;
        serde_json::from_slice(&message.data).map_err(BusError::from)
    }

    /// Subscribe to `subject` as a reply handler.
    pub async fn subscribe(
        &self,
        subject: &str,
    ) -> Result<BusSubscription, BusError> {
        let sub = self
            .conn
            .subscribe(subject)
            .await
            .map_err(BusError::Request)?;
        Ok(BusSubscription(sub))
    }
}

/// A subscription to a Bus subject.
pub struct BusSubscription(nats::asynk::Subscription);

impl BusSubscription {
    /// The next inbound message, or [`None`] if the subscription closed.
    pub async fn next(&self) -> Option<BusMessage> {
        self.0.next().await.map(BusMessage)
    }

    pub async fn unsubscribe(self) -> Result<(), BusError> {
        self.0.unsubscribe().await.map_err(BusError::Request)
    }
}

/// An inbound Bus message, with a JSON reply helper.
pub struct BusMessage(nats::asynk::Message);

impl BusMessage {
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.0.data
    }

    /// Decode the request payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_slice(self.payload()).map_err(BusError::from)
    }

    /// Encode and send the reply. A message without a reply inbox (i.e. not
    /// a request) is silently ignored by the underlying client.
    pub async fn respond_json<T: Serialize>(
        &self,
        reply: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(reply)?;
        self.0.respond(payload).await.map_err(BusError::Request)
    }
}
