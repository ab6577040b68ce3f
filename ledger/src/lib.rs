//! The ledger (component D).
//!
//! Consumes `payment.state.changed` and, for each payment reaching
//! SUCCEEDED, posts a balanced group of journal entries under row locks:
//! debit the customer clearing account, credit the merchant net of the
//! platform fee, credit the platform the fee. Globally-unique entry
//! idempotency keys make duplicate deliveries no-ops. See `schema.sql` for
//! the Store schema.

pub mod config;
pub mod consumer;
pub mod posting;
pub mod routes;
pub mod store;
