//! Payment intents, the lifecycle state lattice, and fraud decisions.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use anyhow::anyhow;
#[cfg(any(test, feature = "test-utils"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::VariantArray;

use crate::{
    amount::Amount,
    currency::Currency,
    ids::{CustomerId, IdempotencyKey, MerchantId, PaymentId},
    time::TimestampMs,
};

// --- PaymentIntent --- //

/// A payment intent as accepted at ingress. This is both the API response
/// body for `POST /payments` / `GET /payments/{id}` and the value cached in
/// KV under the idempotency key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct PaymentIntent {
    pub id: PaymentId,
    pub amount: Amount,
    pub currency: Currency,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
    pub status: IntentStatus,
    pub idempotency_key: IdempotencyKey,
    pub created_at: TimestampMs,
}

/// The status of a [`PaymentIntent`] as far as the ingress is concerned.
/// The real lifecycle lives in the orchestrator's [`PaymentState`]; the
/// ingress only ever moves `NEW -> CONFIRMED` via the admin confirm path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum IntentStatus {
    New,
    Confirmed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Confirmed => "CONFIRMED",
        }
    }
}

impl FromStr for IntentStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "CONFIRMED" => Ok(Self::Confirmed),
            _ => Err(anyhow!("Must be NEW|CONFIRMED")),
        }
    }
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- PaymentState --- //

/// A payment's position in the orchestrator's lifecycle lattice.
///
/// ```text
/// NEW ──► AUTH_PENDING ──► AUTHORIZED ──► CAPTURED ──► SUCCEEDED
///                    └─► FAILED
/// ```
///
/// `FAILED` is entered on fraud deny, manual review, or fraud timeout.
/// `CANCELED` has no in-core inbound edge (it is reserved for an admin
/// cancellation path) but is honored as terminal wherever it is observed.
/// Transitions are only legal along [`PaymentState::can_transition_to`];
/// terminal states admit no further transitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum PaymentState {
    New,
    AuthPending,
    Authorized,
    Captured,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentState {
    /// The transitions walked, in order, when fraud approves a payment.
    pub const APPROVAL_PATH: [Self; 3] =
        [Self::Authorized, Self::Captured, Self::Succeeded];

    /// Whether this state admits no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Whether `self -> to` is an edge of the lifecycle lattice.
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::New, Self::AuthPending) => true,
            (Self::AuthPending, Self::Authorized) => true,
            (Self::AuthPending, Self::Failed) => true,
            (Self::Authorized, Self::Captured) => true,
            (Self::Captured, Self::Succeeded) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::AuthPending => "AUTH_PENDING",
            Self::Authorized => "AUTHORIZED",
            Self::Captured => "CAPTURED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl FromStr for PaymentState {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "AUTH_PENDING" => Ok(Self::AuthPending),
            "AUTHORIZED" => Ok(Self::Authorized),
            "CAPTURED" => Ok(Self::Captured),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(anyhow!(
                "Must be NEW|AUTH_PENDING|AUTHORIZED|CAPTURED|SUCCEEDED\
                 |FAILED|CANCELED"
            )),
        }
    }
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Fraud decisions --- //

/// The decision returned by the fraud evaluator on the Bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum FraudDecision {
    Approve,
    Deny,
    ManualReview,
}

impl FraudDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::ManualReview => "manual_review",
        }
    }
}

impl FromStr for FraudDecision {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "deny" => Ok(Self::Deny),
            "manual_review" => Ok(Self::ManualReview),
            _ => Err(anyhow!("Must be approve|deny|manual_review")),
        }
    }
}

impl Display for FraudDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fraud outcome recorded on a payment's state row. Unlike
/// [`FraudDecision`] this includes `Timeout`, which the evaluator never
/// replies with but the orchestrator records when the reply deadline lapses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum FraudVerdict {
    Approve,
    Deny,
    ManualReview,
    Timeout,
}

impl FraudVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::ManualReview => "manual_review",
            Self::Timeout => "timeout",
        }
    }
}

impl From<FraudDecision> for FraudVerdict {
    fn from(decision: FraudDecision) -> Self {
        match decision {
            FraudDecision::Approve => Self::Approve,
            FraudDecision::Deny => Self::Deny,
            FraudDecision::ManualReview => Self::ManualReview,
        }
    }
}

impl FromStr for FraudVerdict {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "deny" => Ok(Self::Deny),
            "manual_review" => Ok(Self::ManualReview),
            "timeout" => Ok(Self::Timeout),
            _ => Err(anyhow!("Must be approve|deny|manual_review|timeout")),
        }
    }
}

impl Display for FraudVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use proptest::{
        arbitrary::any, prop_assert, prop_assert_eq, prop_assume, proptest,
    };

    use super::*;
    use crate::test_utils::roundtrip;

    #[test]
    fn enums_roundtrip() {
        roundtrip::json_string_roundtrip_proptest::<IntentStatus>();
        roundtrip::json_string_roundtrip_proptest::<PaymentState>();
        roundtrip::json_string_roundtrip_proptest::<FraudDecision>();
        roundtrip::json_string_roundtrip_proptest::<FraudVerdict>();
        roundtrip::fromstr_display_roundtrip_proptest::<IntentStatus>();
        roundtrip::fromstr_display_roundtrip_proptest::<PaymentState>();
        roundtrip::fromstr_display_roundtrip_proptest::<FraudDecision>();
        roundtrip::fromstr_display_roundtrip_proptest::<FraudVerdict>();
    }

    /// The wire encodings are load-bearing (they live in Store rows and Log
    /// payloads), so pin them against accidental renames.
    #[test]
    fn enum_encodings_backwards_compat() {
        roundtrip::json_unit_enum_backwards_compat::<IntentStatus>(
            r#"["NEW","CONFIRMED"]"#,
        );
        roundtrip::json_unit_enum_backwards_compat::<PaymentState>(
            r#"["NEW","AUTH_PENDING","AUTHORIZED","CAPTURED","SUCCEEDED","FAILED","CANCELED"]"#,
        );
        roundtrip::json_unit_enum_backwards_compat::<FraudDecision>(
            r#"["approve","deny","manual_review"]"#,
        );
        roundtrip::json_unit_enum_backwards_compat::<FraudVerdict>(
            r#"["approve","deny","manual_review","timeout"]"#,
        );
    }

    #[test]
    fn intent_roundtrips() {
        roundtrip::json_value_canonical_proptest::<PaymentIntent>();
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        proptest!(|(from in any::<PaymentState>(), to in any::<PaymentState>())| {
            prop_assume!(from.is_terminal());
            prop_assert!(!from.can_transition_to(to));
        })
    }

    #[test]
    fn no_self_transitions() {
        proptest!(|(state in any::<PaymentState>())| {
            prop_assert!(!state.can_transition_to(state));
        })
    }

    /// Walk the approval path from NEW and check that every hop is legal and
    /// that the walk ends in the one legal terminal success state.
    #[test]
    fn approval_path_is_legal() {
        let mut state = PaymentState::New;
        assert!(state.can_transition_to(PaymentState::AuthPending));
        state = PaymentState::AuthPending;
        for next in PaymentState::APPROVAL_PATH {
            assert!(state.can_transition_to(next), "{state} -> {next}");
            state = next;
        }
        assert_eq!(state, PaymentState::Succeeded);
        assert!(state.is_terminal());
    }

    /// Every state has at most one legal path to SUCCEEDED, and FAILED is
    /// only reachable from AUTH_PENDING.
    #[test]
    fn failed_only_from_auth_pending() {
        proptest!(|(from in any::<PaymentState>())| {
            let to_failed = from.can_transition_to(PaymentState::Failed);
            prop_assert_eq!(to_failed, from == PaymentState::AuthPending);
        })
    }
}
