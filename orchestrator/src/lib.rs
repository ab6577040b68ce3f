//! The payment orchestrator (component B).
//!
//! Consumes `payment.created`, owns the per-payment lifecycle state machine,
//! consults the fraud evaluator synchronously over the Bus, and emits
//! `payment.state.changed` after every committed transition through the
//! transactional outbox. See `schema.sql` for the Store schema.
//!
//! Correctness rests on two layers:
//!
//! - a KV TTL lock collapses duplicate work within the lock window, and
//! - every transition is a compare-and-swap on the state row, so duplicate
//!   deliveries and racing owners are harmless across the TTL boundary.

pub mod config;
pub mod consumer;
pub mod engine;
pub mod routes;
pub mod store;
pub mod sweeper;

use payline_common::ids::PaymentId;

/// KV key serializing ownership of a payment while it is being driven.
pub fn payment_lock_key(payment_id: PaymentId) -> String {
    format!("payment_lock:{payment_id}")
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::config::{FRAUD_TIMEOUT, STUCK_THRESHOLD};

    #[test]
    fn lock_key_format() {
        let id = PaymentId::from_str(
            "pay_00000000000000000000000000000000",
        )
        .unwrap();
        assert_eq!(
            payment_lock_key(id),
            "payment_lock:pay_00000000000000000000000000000000"
        );
    }

    /// The sweeper must never demote a payment whose fraud consultation is
    /// still within its deadline.
    #[test]
    fn stuck_threshold_covers_fraud_timeout() {
        assert_eq!(STUCK_THRESHOLD, 2 * FRAUD_TIMEOUT);
    }
}
