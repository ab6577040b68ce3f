//! Posting group construction: the pure half of the ledger.
//!
//! For a SUCCEEDED payment of amount `A` with platform fee `F`:
//!
//! | account              | entry  | amount  |
//! |----------------------|--------|---------|
//! | customer-{customer}  | debit  | A       |
//! | merchant-{merchant}  | credit | A − F   |
//! | platform-001         | credit | F       |
//!
//! Debits and credits sum to `A` on both sides, so every group balances by
//! construction. Zero-amount entries are dropped (journal entries are
//! strictly positive), which preserves the balance.

use payline_common::{
    amount::Amount,
    event::PaymentStateChanged,
    ids::{AccountId, PaymentId},
    ledger::EntryType,
    payment::PaymentState,
};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// The platform's cut of every successful payment.
pub const PLATFORM_FEE_RATE: Decimal = dec!(0.04);

/// One entry of a posting group, before it hits the Store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntrySpec {
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Amount,
    /// The account's role in this group; part of the idempotency key.
    pub role: &'static str,
}

impl EntrySpec {
    /// `{payment_id}-{state}-{role}`, globally unique, which is what makes
    /// duplicate deliveries no-ops.
    pub fn idempotency_key(
        &self,
        payment_id: PaymentId,
        state: PaymentState,
    ) -> String {
        format!("{payment_id}-{state}-{role}", role = self.role)
    }
}

/// The platform fee for a payment amount, rounded to cents.
pub fn platform_fee(amount: Amount) -> Amount {
    let fee = (amount.as_decimal() * PLATFORM_FEE_RATE)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Amount::try_from_decimal(fee)
        .expect("A rounded fraction of a valid amount is a valid amount")
}

/// Build the balanced posting group for a state-change event. Only
/// SUCCEEDED posts; everything else yields an empty group.
pub fn posting_group(event: &PaymentStateChanged) -> Vec<EntrySpec> {
    if event.state != PaymentState::Succeeded {
        return Vec::new();
    }

    let amount = event.amount;
    let fee = platform_fee(amount);
    let net = amount - fee;

    let group = [
        EntrySpec {
            account_id: AccountId::for_customer(&event.customer_id),
            entry_type: EntryType::Debit,
            amount,
            role: "customer",
        },
        EntrySpec {
            account_id: AccountId::for_merchant(&event.merchant_id),
            entry_type: EntryType::Credit,
            amount: net,
            role: "merchant",
        },
        EntrySpec {
            account_id: AccountId::platform(),
            entry_type: EntryType::Credit,
            amount: fee,
            role: "platform",
        },
    ];

    group
        .into_iter()
        .filter(|spec| !spec.amount.is_zero())
        .collect()
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use payline_common::{
        amount::Balance,
        currency::Currency,
        ids::{CustomerId, MerchantId},
        time::TimestampMs,
    };
    use proptest::{arbitrary::any, prop_assert, prop_assert_eq, proptest};

    use super::*;

    fn succeeded_event(amount: Amount) -> PaymentStateChanged {
        PaymentStateChanged {
            payment_id: PaymentId::generate(),
            state: PaymentState::Succeeded,
            previous_state: PaymentState::Captured,
            timestamp: TimestampMs::now(),
            amount,
            currency: Currency::USD,
            customer_id: CustomerId::from_str("C1").unwrap(),
            merchant_id: MerchantId::from_str("M1").unwrap(),
        }
    }

    #[test]
    fn fee_split_is_exact_for_even_amounts() {
        // 50.00 -> 2.00 fee, 48.00 net.
        let amount = Amount::from_cents(5_000);
        assert_eq!(platform_fee(amount), Amount::from_cents(200));

        let group = posting_group(&succeeded_event(amount));
        assert_eq!(group.len(), 3);
        assert_eq!(group[0].role, "customer");
        assert_eq!(group[0].amount, amount);
        assert_eq!(group[1].role, "merchant");
        assert_eq!(group[1].amount, Amount::from_cents(4_800));
        assert_eq!(group[2].role, "platform");
        assert_eq!(group[2].amount, Amount::from_cents(200));
    }

    #[test]
    fn account_targets() {
        let group = posting_group(&succeeded_event(Amount::from_cents(5_000)));
        assert_eq!(group[0].account_id.as_str(), "customer-C1");
        assert_eq!(group[1].account_id.as_str(), "merchant-M1");
        assert_eq!(group[2].account_id.as_str(), "platform-001");
    }

    #[test]
    fn idempotency_key_format() {
        let event = succeeded_event(Amount::from_cents(5_000));
        let group = posting_group(&event);
        let key = group[1].idempotency_key(event.payment_id, event.state);
        assert_eq!(key, format!("{}-SUCCEEDED-merchant", event.payment_id));
    }

    #[test]
    fn non_succeeded_states_do_not_post() {
        for state in [
            PaymentState::New,
            PaymentState::AuthPending,
            PaymentState::Authorized,
            PaymentState::Captured,
            PaymentState::Failed,
            PaymentState::Canceled,
        ] {
            let mut event = succeeded_event(Amount::from_cents(5_000));
            event.state = state;
            assert!(posting_group(&event).is_empty(), "{state} posted");
        }
    }

    /// ∀ amounts: the group balances (Σ credits == Σ debits), entry amounts
    /// are strictly positive, and applying the group to zero balances moves
    /// exactly `amount` out of the customer account.
    #[test]
    fn groups_always_balance() {
        proptest!(|(amount in any::<Amount>())| {
            let group = posting_group(&succeeded_event(amount));

            let mut credits = Balance::ZERO;
            let mut debits = Balance::ZERO;
            for spec in &group {
                prop_assert!(!spec.amount.is_zero());
                match spec.entry_type {
                    EntryType::Credit =>
                        credits = credits.apply(EntryType::Credit, spec.amount),
                    EntryType::Debit =>
                        debits = debits.apply(EntryType::Credit, spec.amount),
                }
            }
            prop_assert_eq!(credits, debits);
            prop_assert_eq!(credits, Balance::from(amount));
        })
    }

    /// The fee never exceeds the amount and is always representable.
    #[test]
    fn fee_is_bounded() {
        proptest!(|(amount in any::<Amount>())| {
            let fee = platform_fee(amount);
            prop_assert!(fee <= amount);
        })
    }
}
