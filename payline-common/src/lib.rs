//! Payment domain types shared by every Payline service.
//!
//! This crate owns the closed sum types (`PaymentState`, `FraudDecision`,
//! `EntryType`, ...) and validated newtypes (`Amount`, `Currency`, ids) that
//! flow between services. String encodings exist only at the wire / storage
//! edge, via the `FromStr` / `Display` impls on each type.

/// Monetary amounts and signed account balances.
pub mod amount;
/// ISO 4217-style three-letter currency codes.
pub mod currency;
/// Environment variable configuration helpers.
pub mod env;
/// Log topics, Bus subjects, and their payload types.
pub mod event;
/// Validated identifier newtypes.
pub mod ids;
/// Ledger account and journal entry types.
pub mod ledger;
/// Payment intents, the lifecycle state lattice, and fraud decisions.
pub mod payment;
/// Millisecond unix timestamps.
pub mod time;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
