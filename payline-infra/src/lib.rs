//! Clients for the external collaborators every service talks to.
//!
//! Terminology follows the system design:
//!
//! - **Store**: the service-private Postgres database.
//! - **KV**: the shared Redis cache/lock store.
//! - **Log**: the partitioned, ordered, at-least-once event log, realized on
//!   Redis Streams consumer groups.
//! - **Bus**: the fire-and-forget request/reply bus (NATS).
//!
//! Connection handles are explicit values threaded through constructors;
//! there are no module-level singletons.

/// Request/reply bus (NATS).
pub mod bus;
/// KV cache, TTL locks, velocity counters (Redis).
pub mod kv;
/// Ordered at-least-once event log (Redis Streams).
pub mod log;
/// Transactional outbox table access and the drain loop.
pub mod outbox;
/// Postgres pool setup and Store error helpers.
pub mod store;
