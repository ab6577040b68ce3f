//! Validated identifier newtypes.
//!
//! Client-chosen identifiers (customer, merchant, idempotency key) are
//! validated at the edge so the rest of the pipeline can treat them as
//! well-formed. [`PaymentId`] is generated by the ingress and is the
//! partition key for everything downstream.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use anyhow::{ensure, Context};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::ledger::AccountType;

/// The maximum length accepted for client-chosen identifiers.
const MAX_ID_LEN: usize = 64;
/// The maximum length accepted for idempotency keys.
const MAX_KEY_LEN: usize = 128;

/// Checks that a client-chosen identifier is non-empty, within `max_len`, and
/// contains only `[A-Za-z0-9_-]`.
fn validate_identifier(s: &str, max_len: usize) -> anyhow::Result<()> {
    ensure!(!s.is_empty(), "Identifier must not be empty");
    ensure!(s.len() <= max_len, "Identifier exceeds {max_len} bytes");
    ensure!(
        s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-'),
        "Identifier may only contain letters, digits, '_' and '-'"
    );
    Ok(())
}

// --- PaymentId --- //

/// A globally-unique identifier for a payment, generated at ingress.
///
/// Serializes as `pay_<32 hex chars>`. This is the partition key on the Log,
/// the lock key in KV, and the correlation id on the Bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Generate a fresh, unique [`PaymentId`].
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// `pay_<32 hex chars>`
impl FromStr for PaymentId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let hex = s
            .strip_prefix("pay_")
            .context("Payment id must start with 'pay_'")?;
        Uuid::try_parse(hex)
            .map(Self)
            .context("Invalid payment id")
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pay_{}", self.0.as_simple())
    }
}

// --- CustomerId / MerchantId --- //

/// A client-chosen customer identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct CustomerId(String);

impl CustomerId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CustomerId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        validate_identifier(s, MAX_ID_LEN).context("Invalid customer id")?;
        Ok(Self(s.to_owned()))
    }
}

impl Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client-chosen merchant identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct MerchantId(String);

impl MerchantId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MerchantId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        validate_identifier(s, MAX_ID_LEN).context("Invalid merchant id")?;
        Ok(Self(s.to_owned()))
    }
}

impl Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- IdempotencyKey --- //

/// A client-chosen token ensuring that payment creation has effect at most
/// once. Supplied in the `Idempotency-Key` request header.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdempotencyKey {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        validate_identifier(s, MAX_KEY_LEN)
            .context("Invalid idempotency key")?;
        Ok(Self(s.to_owned()))
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- AccountId --- //

/// A ledger account identifier.
///
/// Account ids are structured strings: `platform-001`, `merchant-{id}`,
/// `customer-{id}`. The prefix determines the [`AccountType`] used when an
/// account is auto-provisioned on first reference.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct AccountId(String);

impl AccountId {
    /// The pre-seeded platform fee account.
    pub fn platform() -> Self {
        Self("platform-001".to_owned())
    }

    /// The settlement account for a merchant.
    pub fn for_merchant(merchant_id: &MerchantId) -> Self {
        Self(format!("merchant-{merchant_id}"))
    }

    /// The clearing account for a customer.
    pub fn for_customer(customer_id: &CustomerId) -> Self {
        Self(format!("customer-{customer_id}"))
    }

    /// The [`AccountType`] this account gets when auto-provisioned.
    /// Unprefixed ids default to merchant.
    pub fn inferred_type(&self) -> AccountType {
        if self.0.starts_with("platform-") {
            AccountType::Platform
        } else if self.0.starts_with("customer-") {
            AccountType::Customer
        } else {
            AccountType::Merchant
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        // Account ids embed client identifiers after a prefix; 160 bytes
        // covers the longest prefixed form.
        ensure!(!s.is_empty(), "Account id must not be empty");
        ensure!(s.len() <= 160, "Account id exceeds 160 bytes");
        ensure!(
            s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-'),
            "Account id may only contain letters, digits, '_' and '-'"
        );
        Ok(Self(s.to_owned()))
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Errors if the conversion produces an invalid account id; used at the Store
// edge where ids come back as raw strings.
impl TryFrom<String> for AccountId {
    type Error = anyhow::Error;
    fn try_from(s: String) -> anyhow::Result<Self> {
        Self::from_str(&s)
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
    use crate::test_utils::arbitrary::any_identifier;

    impl Arbitrary for PaymentId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 16]>()
                .prop_map(|bytes| Self(Uuid::from_bytes(bytes)))
                .boxed()
        }
    }

    impl Arbitrary for CustomerId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any_identifier().prop_map(Self).boxed()
        }
    }

    impl Arbitrary for MerchantId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any_identifier().prop_map(Self).boxed()
        }
    }

    impl Arbitrary for IdempotencyKey {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any_identifier().prop_map(Self).boxed()
        }
    }

    impl Arbitrary for AccountId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            proptest::prop_oneof![
                any::<MerchantId>().prop_map(|m| Self::for_merchant(&m)),
                any::<CustomerId>().prop_map(|c| Self::for_customer(&c)),
                proptest::strategy::Just(Self::platform()),
            ]
            .boxed()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::roundtrip;

    #[test]
    fn ids_roundtrip() {
        roundtrip::json_string_roundtrip_proptest::<PaymentId>();
        roundtrip::json_string_roundtrip_proptest::<CustomerId>();
        roundtrip::json_string_roundtrip_proptest::<MerchantId>();
        roundtrip::json_string_roundtrip_proptest::<IdempotencyKey>();
        roundtrip::json_string_roundtrip_proptest::<AccountId>();
        roundtrip::fromstr_display_roundtrip_proptest::<PaymentId>();
        roundtrip::fromstr_display_roundtrip_proptest::<AccountId>();
    }

    #[test]
    fn payment_id_format() {
        let id = PaymentId::generate();
        let s = id.to_string();
        assert!(s.starts_with("pay_"));
        assert_eq!(s.len(), "pay_".len() + 32);
        assert_eq!(PaymentId::from_str(&s).unwrap(), id);
    }

    #[test]
    fn identifier_validation() {
        assert!(CustomerId::from_str("C1").is_ok());
        assert!(CustomerId::from_str("").is_err());
        assert!(CustomerId::from_str("a b").is_err());
        assert!(CustomerId::from_str(&"x".repeat(65)).is_err());
        assert!(IdempotencyKey::from_str(&"k".repeat(128)).is_ok());
        assert!(IdempotencyKey::from_str(&"k".repeat(129)).is_err());
    }

    #[test]
    fn account_id_type_inference() {
        assert_eq!(
            AccountId::platform().inferred_type(),
            AccountType::Platform
        );
        let merchant = MerchantId::from_str("M1").unwrap();
        assert_eq!(
            AccountId::for_merchant(&merchant).inferred_type(),
            AccountType::Merchant
        );
        let customer = CustomerId::from_str("C1").unwrap();
        let account = AccountId::for_customer(&customer);
        assert_eq!(account.as_str(), "customer-C1");
        assert_eq!(account.inferred_type(), AccountType::Customer);
    }
}
