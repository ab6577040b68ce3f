//! A currency amount newtype which maintains some useful internal invariants,
//! plus the signed [`Balance`] type used for ledger account balances.
//!
//! [`Amount`] is the money type for everything that moves: payment amounts,
//! fees, journal entry amounts. It is non-negative and exact to two decimal
//! places. Account balances are a different animal — a clearing account may
//! legitimately go below zero — so they get their own signed [`Balance`] type
//! rather than abusing [`Amount`].
//!
//! If an [`Amount`] needs to be parsed from a user-provided [`String`], use
//! `Decimal::from_str`, then [`Amount::try_from_decimal`]. We don't impl
//! [`FromStr`] so that calling code stays explicit about its inputs.
//!
//! [`FromStr`]: std::str::FromStr

use std::{
    fmt::{self, Display},
    ops::{Add, Sub},
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ledger::EntryType;

/// Errors that can occur when attempting to construct an [`Amount`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Amount is negative")]
    Negative,
    #[error("Amount is too large")]
    TooLarge,
    #[error("Amount has more than two decimal places")]
    TooPrecise,
}

/// A monetary amount, internally represented as a [`Decimal`], which provides
/// the following properties:
///
/// - The contained value is non-negative.
/// - The contained value is no greater than [`Amount::MAX`].
/// - The contained value is exact to at most two decimal places, so
///   conversions to and from integer cents are lossless.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub struct Amount(Decimal);

impl Amount {
    /// The maximum [`Amount`] that this type can represent. We set this
    /// exactly equal to [`u64::MAX`] cents because it makes conversions to
    /// and from [`u64`] infallible and hence ergonomic.
    // Correctness of this Decimal::from_parts is checked in the tests.
    pub const MAX: Self =
        Self(Decimal::from_parts(4294967295, 4294967295, 0, false, 2));

    /// An [`Amount`] of zero.
    pub const ZERO: Self = Self(dec!(0));

    // --- Constructors --- //

    /// Construct an [`Amount`] from a [`u64`] number of cents.
    #[inline]
    pub fn from_cents(cents: u64) -> Self {
        Self(Decimal::from(cents) / dec!(100))
    }

    /// Construct an [`Amount`] from a major-units [`Decimal`] value, e.g.
    /// `dec!(50.00)` for fifty dollars. Checks all internal invariants.
    pub fn try_from_decimal(inner: Decimal) -> Result<Self, Error> {
        if inner.is_sign_negative() {
            return Err(Error::Negative);
        }
        if inner > Self::MAX.0 {
            return Err(Error::TooLarge);
        }
        // Exactness check: scaling to cents must not leave a fraction.
        let cents = inner * dec!(100);
        if cents != cents.trunc() {
            return Err(Error::TooPrecise);
        }
        Ok(Self(inner))
    }

    // --- Getters --- //

    /// Returns the [`Amount`] as a [`u64`] number of cents.
    #[inline]
    pub fn cents(&self) -> u64 {
        (self.0 * dec!(100))
            .to_u64()
            .expect("Amount::MAX == u64::MAX cents")
    }

    /// Returns the [`Amount`] as a major-units [`Decimal`] value.
    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    // --- Checked arithmetic --- //

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let inner = self.0.checked_add(rhs.0)?;
        Self::try_from_decimal(inner).ok()
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let inner = self.0.checked_sub(rhs.0)?;
        Self::try_from_decimal(inner).ok()
    }
}

/// Enforces the [`Amount`] invariants on deserialized input.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner: Decimal = Deserialize::deserialize(deserializer)?;
        Self::try_from_decimal(inner)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl Display for Amount {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always render both decimal places: "50.00", not "50".
        write!(f, "{:.2}", self.0)
    }
}

// --- Basic std::ops impls --- //

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::try_from_decimal(self.0 + rhs.0).expect("Overflowed")
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::try_from_decimal(self.0 - rhs.0).expect("Underflowed")
    }
}

// --- Balance --- //

/// A signed account balance, exact to two decimal places.
///
/// Unlike [`Amount`], a [`Balance`] may be negative: customer clearing
/// accounts carry a receivable against the external card network, which
/// manifests as a negative balance until settlement.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize,
    Deserialize,
)]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(dec!(0));

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Construct a [`Balance`] from a raw [`Decimal`], e.g. a Store read.
    #[inline]
    pub fn from_decimal(inner: Decimal) -> Self {
        Self(inner)
    }

    /// Apply a journal entry to this balance: credits add, debits subtract.
    #[must_use]
    pub fn apply(self, entry_type: EntryType, amount: Amount) -> Self {
        match entry_type {
            EntryType::Credit => Self(self.0 + amount.as_decimal()),
            EntryType::Debit => Self(self.0 - amount.as_decimal()),
        }
    }
}

impl From<Amount> for Balance {
    #[inline]
    fn from(amount: Amount) -> Self {
        Self(amount.as_decimal())
    }
}

impl Display for Balance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// --- Tests and test infra --- //

#[cfg(any(test, feature = "test-utils"))]
mod arbitrary_impl {
    use proptest::{
        arbitrary::{any, Arbitrary},
        strategy::{BoxedStrategy, Strategy},
    };

    use super::*;

    impl Arbitrary for Amount {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<u64>().prop_map(Amount::from_cents).boxed()
        }
    }

    impl Arbitrary for Balance {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<i64>()
                .prop_map(|cents| {
                    Balance::from_decimal(Decimal::from(cents) / dec!(100))
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::{arbitrary::any, prop_assert, prop_assert_eq, proptest};

    use super::*;

    /// Check the usage of Decimal::from_parts to define Amount::MAX.
    #[test]
    fn check_associated_constants() {
        let max_u64_cents = Decimal::from(u64::MAX) / dec!(100);
        assert_eq!(Amount::MAX, Amount(max_u64_cents));
        assert_eq!(Amount::MAX.cents(), u64::MAX);
        assert_eq!(Amount::ZERO.cents(), 0);
    }

    /// Converting cents to [`Amount`] and back must not lose precision.
    #[test]
    fn no_cents_precision_loss() {
        proptest!(|(cents1 in any::<u64>())| {
            let amount = Amount::from_cents(cents1);
            prop_assert_eq!(cents1, amount.cents());
        })
    }

    #[test]
    fn try_from_decimal_enforces_invariants() {
        assert!(Amount::try_from_decimal(dec!(-0.01)).is_err());
        assert!(Amount::try_from_decimal(dec!(1.001)).is_err());
        assert!(Amount::try_from_decimal(Amount::MAX.0 + dec!(1)).is_err());
        assert_eq!(
            Amount::try_from_decimal(dec!(50.00)).unwrap(),
            Amount::from_cents(5000)
        );
        assert_eq!(Amount::try_from_decimal(dec!(0)).unwrap(), Amount::ZERO);
    }

    #[test]
    fn deserialize_enforces_invariants() {
        assert!(serde_json::from_str::<Amount>("\"50.00\"").is_ok());
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
        assert!(serde_json::from_str::<Amount>("\"1.001\"").is_err());
    }

    #[test]
    fn display_always_two_places() {
        assert_eq!(Amount::from_cents(5000).to_string(), "50.00");
        assert_eq!(Amount::from_cents(5).to_string(), "0.05");
        assert_eq!(Balance::ZERO.to_string(), "0.00");
    }

    #[test]
    fn amount_add_sub() {
        proptest!(|(
            amount1 in any::<Amount>(),
            amount2 in any::<Amount>(),
        )| {
            let (greater, lesser) = if amount1 >= amount2 {
                (amount1, amount2)
            } else {
                (amount2, amount1)
            };

            let diff = greater - lesser;
            prop_assert_eq!(greater, lesser + diff);
            prop_assert_eq!(lesser, greater - diff);

            if greater > lesser {
                prop_assert!(lesser.checked_sub(greater).is_none());
            }
        })
    }

    /// A credit followed by an equal debit must return to the same balance.
    #[test]
    fn balance_apply_roundtrip() {
        proptest!(|(
            balance in any::<Balance>(),
            amount in any::<Amount>(),
        )| {
            let credited = balance.apply(EntryType::Credit, amount);
            let back = credited.apply(EntryType::Debit, amount);
            prop_assert_eq!(balance, back);
        })
    }

    #[test]
    fn balance_may_go_negative() {
        let balance = Balance::ZERO
            .apply(EntryType::Debit, Amount::from_cents(100));
        assert!(balance.is_negative());
        assert_eq!(balance.to_string(), "-1.00");
    }
}
