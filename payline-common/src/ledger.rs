//! Ledger account and journal entry types.

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
    amount::{Amount, Balance},
    currency::Currency,
    ids::{AccountId, PaymentId},
    time::TimestampMs,
};

// --- Account --- //

/// A ledger account. The invariant `balance = Σ credits − Σ debits` over the
/// account's entries is maintained by the ledger's posting transaction, which
/// writes each entry together with its post-entry balance under a row lock.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct Account {
    pub id: AccountId,
    pub account_type: AccountType,
    pub balance: Balance,
    pub available_balance: Balance,
    pub hold_balance: Balance,
    pub currency: Currency,
    pub status: AccountStatus,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum AccountType {
    Platform,
    Merchant,
    Customer,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Merchant => "merchant",
            Self::Customer => "customer",
        }
    }

    /// Whether the non-negative balance invariant is enforced for accounts
    /// of this type. Customer accounts are clearing accounts against the
    /// external card network and may carry a negative balance.
    #[inline]
    pub fn enforces_non_negative(&self) -> bool {
        !matches!(self, Self::Customer)
    }
}

impl FromStr for AccountType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(Self::Platform),
            "merchant" => Ok(Self::Merchant),
            "customer" => Ok(Self::Customer),
            _ => Err(anyhow!("Must be platform|merchant|customer")),
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            _ => Err(anyhow!("Must be active|suspended")),
        }
    }
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- LedgerEntry --- //

/// A single journal entry. Entries are append-only; `id` is assigned by the
/// Store and increases monotonically, and `idempotency_key` is unique
/// globally, which is what absorbs duplicate Log deliveries.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: AccountId,
    pub payment_id: PaymentId,
    pub entry_type: EntryType,
    pub amount: Amount,
    /// The account balance immediately after this entry was applied.
    pub balance: Balance,
    pub idempotency_key: String,
    pub created_at: TimestampMs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr, VariantArray)]
#[cfg_attr(any(test, feature = "test-utils"), derive(Arbitrary))]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl FromStr for EntryType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(anyhow!("Must be debit|credit")),
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::roundtrip;

    #[test]
    fn enums_roundtrip() {
        roundtrip::json_string_roundtrip_proptest::<AccountType>();
        roundtrip::json_string_roundtrip_proptest::<AccountStatus>();
        roundtrip::json_string_roundtrip_proptest::<EntryType>();
        roundtrip::fromstr_display_roundtrip_proptest::<AccountType>();
        roundtrip::fromstr_display_roundtrip_proptest::<AccountStatus>();
        roundtrip::fromstr_display_roundtrip_proptest::<EntryType>();
    }

    #[test]
    fn enum_encodings_backwards_compat() {
        roundtrip::json_unit_enum_backwards_compat::<AccountType>(
            r#"["platform","merchant","customer"]"#,
        );
        roundtrip::json_unit_enum_backwards_compat::<EntryType>(
            r#"["debit","credit"]"#,
        );
    }

    #[test]
    fn structs_roundtrip() {
        roundtrip::json_value_canonical_proptest::<Account>();
        roundtrip::json_value_canonical_proptest::<LedgerEntry>();
    }

    #[test]
    fn only_customer_accounts_may_go_negative() {
        assert!(AccountType::Platform.enforces_non_negative());
        assert!(AccountType::Merchant.enforces_non_negative());
        assert!(!AccountType::Customer.enforces_non_negative());
    }
}
