//! Log topics, Bus subjects, and their payload types.
//!
//! These are the wire schemas between services. The Log is at-least-once and
//! partitioned by payment id, so every payload carries the payment id as its
//! partition key. Field names are part of the contract; the
//! backwards-compat tests below pin them.

use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-utils"))]
use proptest_derive::Arbitrary;

use crate::{
    amount::Amount,
    currency::Currency,
    ids::{CustomerId, MerchantId, PaymentId},
    payment::{FraudDecision, IntentStatus, PaymentIntent, PaymentState},
    time::TimestampMs,
};

/// Log topic: a payment intent was accepted at ingress.
pub const TOPIC_PAYMENT_CREATED: &str = "payment.created";
/// Log topic: the orchestrator committed a state transition.
pub const TOPIC_PAYMENT_STATE_CHANGED: &str = "payment.state.changed";
/// Bus subject: synchronous fraud consultation, request/reply.
pub const SUBJECT_FRAUD_CHECK: &str = "fraud.check";

// --- payment.created --- //

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct PaymentCreated {
    pub payment_id: PaymentId,
    pub amount: Amount,
    pub currency: Currency,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
    pub status: IntentStatus,
    pub created_at: TimestampMs,
}

impl From<&PaymentIntent> for PaymentCreated {
    fn from(intent: &PaymentIntent) -> Self {
        Self {
            payment_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            customer_id: intent.customer_id.clone(),
            merchant_id: intent.merchant_id.clone(),
            status: intent.status,
            created_at: intent.created_at,
        }
    }
}

// --- payment.state.changed --- //

/// Emitted after every committed state transition.
///
/// Carries the payment facts (amount, currency, parties) alongside the
/// transition so the ledger can post the actual amount without a lookback
/// query against the ingress.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct PaymentStateChanged {
    pub payment_id: PaymentId,
    pub state: PaymentState,
    pub previous_state: PaymentState,
    pub timestamp: TimestampMs,
    pub amount: Amount,
    pub currency: Currency,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
}

// --- fraud.check --- //

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct FraudCheckRequest {
    pub payment_id: PaymentId,
    pub amount: Amount,
    pub customer_id: CustomerId,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct FraudCheckReply {
    pub decision: FraudDecision,
    pub reason: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::roundtrip;

    #[test]
    fn payloads_roundtrip() {
        roundtrip::json_value_canonical_proptest::<PaymentCreated>();
        roundtrip::json_value_canonical_proptest::<PaymentStateChanged>();
        roundtrip::json_value_canonical_proptest::<FraudCheckRequest>();
        roundtrip::json_value_canonical_proptest::<FraudCheckReply>();
    }

    /// Pin the serialized field names and encodings; consumers in other
    /// services parse these exact shapes.
    #[test]
    fn payload_field_names_backwards_compat() {
        let json = serde_json::json!({
            "payment_id": "pay_00000000000000000000000000000000",
            "amount": "50.00",
            "currency": "USD",
            "customer_id": "C1",
            "merchant_id": "M1",
            "status": "NEW",
            "created_at": 0,
        });
        let event: PaymentCreated = serde_json::from_value(json).unwrap();
        assert_eq!(event.amount, Amount::from_cents(5000));
        assert_eq!(event.status, IntentStatus::New);

        let json = serde_json::json!({
            "payment_id": "pay_00000000000000000000000000000000",
            "state": "SUCCEEDED",
            "previous_state": "CAPTURED",
            "timestamp": 1,
            "amount": "50.00",
            "currency": "USD",
            "customer_id": "C1",
            "merchant_id": "M1",
        });
        let event: PaymentStateChanged = serde_json::from_value(json).unwrap();
        assert_eq!(event.state, PaymentState::Succeeded);
        assert_eq!(event.previous_state, PaymentState::Captured);
    }

    /// `Arbitrary` for `FraudCheckReply` generates arbitrary reason strings;
    /// make sure exotic unicode survives the JSON edge.
    #[test]
    fn reply_reason_is_freeform() {
        let reply = FraudCheckReply {
            decision: FraudDecision::Deny,
            reason: "velocity limit exceeded".to_owned(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            serde_json::from_str::<FraudCheckReply>(&json).unwrap(),
            reply
        );
    }
}
