//! The payment ingress (component A).
//!
//! Admits payment intents at most once per client-chosen idempotency key,
//! persists them, and emits `payment.created` onto the Log through the
//! transactional outbox. See `schema.sql` for the Store schema.

use payline_infra::kv::Kv;
use payline_tokio::notify;
use sqlx::PgPool;

pub mod config;
pub mod routes;
pub mod store;

/// Everything the HTTP handlers need, threaded through axum state.
#[derive(Clone)]
pub struct IngressState {
    pub db: PgPool,
    pub kv: Kv,
    /// Nudges the outbox drainer after a commit so the `payment.created`
    /// event goes out without waiting for the next drain tick.
    pub outbox_wake: notify::Sender,
}

/// KV key caching the intent for an idempotency key, with a 24 h expiry.
pub fn idempotency_cache_key(key: &payline_common::ids::IdempotencyKey) -> String {
    format!("idempotency:{key}")
}
