//! The fraud evaluator (component C).
//!
//! Replies synchronously to `fraud.check` requests on the Bus using a
//! deterministic, ordered rule set plus a one-hour sliding velocity window
//! per customer. Every reply is appended to an append-only audit table,
//! best-effort, after the reply has been sent. See `schema.sql` for the
//! Store schema.

pub mod config;
pub mod responder;
pub mod routes;
pub mod rules;
pub mod store;
pub mod velocity;
