//! The decision rule set.
//!
//! Rules are evaluated in the listed order and the first triggering rule
//! wins:
//!
//! 1. amount above the hard ceiling -> deny
//! 2. customer velocity above the window limit -> deny
//! 3. amount above the review threshold -> manual review
//! 4. otherwise -> approve
//!
//! The velocity count is an input here: incrementing the counter is a side
//! effect owned by the responder (and is skipped entirely when rule 1
//! already fires), which keeps this module deterministic and fully
//! testable.

use payline_common::{amount::Amount, payment::FraudDecision};

/// Rule 1: amounts above this many cents are denied outright (10,000.00).
pub const HARD_CEILING_CENTS: u64 = 1_000_000;
/// Rule 3: amounts above this many cents go to manual review (5,000.00).
pub const REVIEW_THRESHOLD_CENTS: u64 = 500_000;
/// Risk scoring: amounts above this many cents add +30 risk (1,000.00).
pub const RISK_AMOUNT_CENTS: u64 = 100_000;
/// Rule 2: more than this many payments within the velocity window is a
/// burst.
pub const VELOCITY_LIMIT: u64 = 5;

/// The outcome of evaluating the rule set against one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evaluation {
    pub decision: FraudDecision,
    pub reason: &'static str,
    pub risk_score: u8,
}

/// Evaluate the ordered rule set. `velocity` is the customer's count within
/// the current window *including* this payment, or [`None`] if the counter
/// was unavailable (the check is then skipped; a missing counter alone
/// never blocks an approval).
pub fn evaluate(amount: Amount, velocity: Option<u64>) -> Evaluation {
    let risk_score = risk_score(amount);

    if amount.cents() > HARD_CEILING_CENTS {
        return Evaluation {
            decision: FraudDecision::Deny,
            reason: "amount exceeds hard ceiling",
            risk_score,
        };
    }

    if let Some(count) = velocity {
        if count > VELOCITY_LIMIT {
            return Evaluation {
                decision: FraudDecision::Deny,
                reason: "velocity limit exceeded",
                risk_score,
            };
        }
    }

    if amount.cents() > REVIEW_THRESHOLD_CENTS {
        return Evaluation {
            decision: FraudDecision::ManualReview,
            reason: "amount requires manual review",
            risk_score,
        };
    }

    Evaluation {
        decision: FraudDecision::Approve,
        reason: "within limits",
        risk_score,
    }
}

/// Piecewise risk score: +30 above 1,000.00, +50 more above 5,000.00,
/// clamped to [0, 100].
pub fn risk_score(amount: Amount) -> u8 {
    let mut score: u32 = 0;
    if amount.cents() > RISK_AMOUNT_CENTS {
        score += 30;
    }
    if amount.cents() > REVIEW_THRESHOLD_CENTS {
        score += 50;
    }
    score.min(100) as u8
}

#[cfg(test)]
mod test {
    use proptest::{arbitrary::any, prop_assert, prop_assert_eq, proptest};

    use super::*;

    fn amount(cents: u64) -> Amount {
        Amount::from_cents(cents)
    }

    #[test]
    fn hard_ceiling_denies() {
        let eval = evaluate(amount(1_500_000), Some(1));
        assert_eq!(eval.decision, FraudDecision::Deny);
        assert_eq!(eval.reason, "amount exceeds hard ceiling");
    }

    #[test]
    fn ceiling_is_exclusive() {
        // Exactly 10,000.00 is not above the ceiling.
        let eval = evaluate(amount(HARD_CEILING_CENTS), Some(1));
        assert_ne!(eval.decision, FraudDecision::Deny);
    }

    #[test]
    fn velocity_denies_sixth_payment() {
        for count in 1..=VELOCITY_LIMIT {
            let eval = evaluate(amount(10_000), Some(count));
            assert_eq!(eval.decision, FraudDecision::Approve, "count {count}");
        }
        let eval = evaluate(amount(10_000), Some(VELOCITY_LIMIT + 1));
        assert_eq!(eval.decision, FraudDecision::Deny);
        assert_eq!(eval.reason, "velocity limit exceeded");
    }

    #[test]
    fn ceiling_outranks_velocity() {
        let eval = evaluate(amount(2_000_000), Some(100));
        assert_eq!(eval.reason, "amount exceeds hard ceiling");
    }

    #[test]
    fn velocity_outranks_review() {
        let eval = evaluate(amount(750_000), Some(VELOCITY_LIMIT + 1));
        assert_eq!(eval.reason, "velocity limit exceeded");
    }

    #[test]
    fn review_band() {
        let eval = evaluate(amount(750_000), Some(1));
        assert_eq!(eval.decision, FraudDecision::ManualReview);
    }

    #[test]
    fn missing_velocity_does_not_block_approval() {
        let eval = evaluate(amount(10_000), None);
        assert_eq!(eval.decision, FraudDecision::Approve);
        // But the other rules still apply.
        let eval = evaluate(amount(2_000_000), None);
        assert_eq!(eval.decision, FraudDecision::Deny);
        let eval = evaluate(amount(750_000), None);
        assert_eq!(eval.decision, FraudDecision::ManualReview);
    }

    #[test]
    fn risk_score_piecewise() {
        assert_eq!(risk_score(amount(50_000)), 0);
        assert_eq!(risk_score(amount(100_000)), 0); // boundary: not above
        assert_eq!(risk_score(amount(100_001)), 30);
        assert_eq!(risk_score(amount(500_000)), 30);
        assert_eq!(risk_score(amount(500_001)), 80);
        assert_eq!(risk_score(amount(u64::MAX)), 80);
    }

    /// The rule set is total and deterministic: every (amount, velocity)
    /// pair maps to exactly one decision, and the risk score stays in
    /// [0, 100].
    #[test]
    fn evaluation_is_total() {
        proptest!(|(
            amount in any::<Amount>(),
            velocity in proptest::option::of(any::<u64>()),
        )| {
            let eval1 = evaluate(amount, velocity);
            let eval2 = evaluate(amount, velocity);
            prop_assert_eq!(&eval1, &eval2);
            prop_assert!(eval1.risk_score <= 100);
        })
    }
}
