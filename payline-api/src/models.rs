//! Request and response models for the public HTTP surface.
//!
//! [`PaymentIntent`] serializes directly as the create/get response body, so
//! it is not duplicated here.

use payline_common::{
    amount::{Amount, Balance},
    currency::Currency,
    ids::{AccountId, CustomerId, MerchantId, PaymentId},
    ledger::{Account, AccountStatus, AccountType, LedgerEntry},
    payment::{FraudVerdict, PaymentState},
    time::TimestampMs,
};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use payline_common::payment::PaymentIntent;

// --- Ingress --- //

/// Body of `POST /payments`. All fields are required; the validated
/// newtypes reject malformed values at deserialization time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Amount,
    pub currency: Currency,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
}

// --- Orchestrator --- //

/// Response of `GET /payments/{id}/state`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentStateResponse {
    pub payment_id: PaymentId,
    pub state: PaymentState,
    pub previous_state: Option<PaymentState>,
    pub fraud_decision: Option<FraudVerdict>,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

// --- Fraud --- //

/// Response of `GET /fraud/stats`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FraudStatsResponse {
    /// Total fraud checks evaluated.
    pub evaluated: u64,
    pub approved: u64,
    pub denied: u64,
    pub manual_review: u64,
}

// --- Ledger --- //

/// Response of `GET /accounts/{id}/balance`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub balance: Balance,
    pub available_balance: Balance,
    pub hold_balance: Balance,
    pub currency: Currency,
    pub status: AccountStatus,
}

impl From<Account> for BalanceResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            account_type: account.account_type,
            balance: account.balance,
            available_balance: account.available_balance,
            hold_balance: account.hold_balance,
            currency: account.currency,
            status: account.status,
        }
    }
}

/// Response of `GET /accounts/{id}/entries` (latest 100, newest first) and
/// `GET /payments/{id}/entries` (all entries for the payment, oldest first).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<LedgerEntry>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_payment_request_requires_all_fields() {
        let ok = serde_json::json!({
            "amount": "50.00",
            "currency": "USD",
            "customer_id": "C1",
            "merchant_id": "M1",
        });
        assert!(
            serde_json::from_value::<CreatePaymentRequest>(ok).is_ok()
        );

        for missing in ["amount", "currency", "customer_id", "merchant_id"] {
            let mut body = serde_json::json!({
                "amount": "50.00",
                "currency": "USD",
                "customer_id": "C1",
                "merchant_id": "M1",
            });
            body.as_object_mut().unwrap().remove(missing);
            assert!(
                serde_json::from_value::<CreatePaymentRequest>(body).is_err(),
                "body without {missing} should be rejected"
            );
        }
    }

    #[test]
    fn create_payment_request_rejects_bad_values() {
        let negative = serde_json::json!({
            "amount": "-1.00",
            "currency": "USD",
            "customer_id": "C1",
            "merchant_id": "M1",
        });
        assert!(
            serde_json::from_value::<CreatePaymentRequest>(negative).is_err()
        );

        let bad_currency = serde_json::json!({
            "amount": "1.00",
            "currency": "usd",
            "customer_id": "C1",
            "merchant_id": "M1",
        });
        assert!(
            serde_json::from_value::<CreatePaymentRequest>(bad_currency)
                .is_err()
        );
    }
}
