//! Three-letter currency codes.

use std::{
    fmt::{self, Display},
    str::{self, FromStr},
};

use anyhow::anyhow;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// An ISO 4217-style currency code: exactly three uppercase ASCII letters.
///
/// This is a validated label, not a unit: multi-currency conversion is out of
/// scope, so the pipeline only ever checks codes for equality and carries
/// them through to the ledger.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[derive(SerializeDisplay, DeserializeFromStr)]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Self = Self(*b"USD");

    #[inline]
    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.0).expect("Uppercase ASCII invariant")
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        match bytes {
            [a, b, c]
                if bytes.iter().all(|byte| byte.is_ascii_uppercase()) =>
                Ok(Self([*a, *b, *c])),
            _ => Err(anyhow!(
                "Currency must be exactly three uppercase letters"
            )),
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod arbitrary_impl {
    use proptest::{
        arbitrary::Arbitrary,
        array::uniform3,
        char::range,
        strategy::{BoxedStrategy, Strategy},
    };

    use super::*;

    impl Arbitrary for Currency {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            uniform3(range('A', 'Z'))
                .prop_map(|chars| {
                    Currency([chars[0] as u8, chars[1] as u8, chars[2] as u8])
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::roundtrip;

    #[test]
    fn currency_roundtrips() {
        roundtrip::json_string_roundtrip_proptest::<Currency>();
        roundtrip::fromstr_display_roundtrip_proptest::<Currency>();
    }

    #[test]
    fn currency_validation() {
        assert_eq!(Currency::from_str("USD").unwrap(), Currency::USD);
        assert!(Currency::from_str("usd").is_err());
        assert!(Currency::from_str("USDA").is_err());
        assert!(Currency::from_str("US").is_err());
        assert!(Currency::from_str("U$D").is_err());
    }
}
