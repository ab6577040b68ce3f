//! Roundtrip proptest helpers.

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use proptest::{arbitrary::Arbitrary, prop_assert_eq, proptest};
use serde::{de::DeserializeOwned, Serialize};
use strum::VariantArray;

/// Quickly create a JSON string roundtrip proptest. This test is useful for
/// simple data types that map to/from a single base JSON type (string, int..)
///
/// ```ignore
/// json_string_roundtrip_proptest::<PaymentId>();
/// ```
pub fn json_string_roundtrip_proptest<T>()
where
    T: Arbitrary + PartialEq + Serialize + DeserializeOwned,
{
    proptest!(|(value1: T)| {
        let json_value1 = serde_json::to_string(&value1).unwrap();
        let value2 = serde_json::from_str::<T>(&json_value1).unwrap();
        prop_assert_eq!(&value1, &value2);
    });
}

/// Quickly create a [`serde_json::Value`] canonical roundtrip proptest. This
/// test is useful for dictionary-like types that serialize to/from a JSON
/// object, since object key order is not part of the equality.
///
/// ```ignore
/// json_value_canonical_proptest::<PaymentIntent>();
/// ```
pub fn json_value_canonical_proptest<T>()
where
    T: Arbitrary + PartialEq + Serialize + DeserializeOwned,
{
    proptest!(|(value1: T)| {
        let json_value1 = serde_json::to_value(&value1).unwrap();
        let value2: T = serde_json::from_value(json_value1.clone()).unwrap();
        let json_value2 = serde_json::to_value(&value2).unwrap();

        prop_assert_eq!(&value1, &value2);
        prop_assert_eq!(&json_value1, &json_value2);
    });
}

/// Quickly create a roundtrip proptest for a [`FromStr`] / [`Display`] impl.
///
/// ```ignore
/// fromstr_display_roundtrip_proptest::<PaymentState>();
/// ```
pub fn fromstr_display_roundtrip_proptest<T>()
where
    T: Arbitrary + PartialEq + FromStr + Display,
    <T as FromStr>::Err: Debug,
{
    proptest!(|(value1: T)| {
        let value2 = T::from_str(&value1.to_string()).unwrap();
        prop_assert_eq!(value1, value2)
    });
}

/// Checks that every variant of a unit enum still serializes to its expected
/// (wire-compatible) encoding, and deserializes back.
///
/// ```ignore
/// json_unit_enum_backwards_compat::<EntryType>(r#"["debit","credit"]"#);
/// ```
pub fn json_unit_enum_backwards_compat<T>(expected_ser: &str)
where
    T: VariantArray + PartialEq + Debug + Serialize + DeserializeOwned,
{
    let variants = T::VARIANTS;
    let actual_ser = serde_json::to_string(variants).unwrap();
    assert_eq!(actual_ser, expected_ser);

    let deserialized = serde_json::from_str::<Vec<T>>(expected_ser).unwrap();
    assert_eq!(deserialized.as_slice(), variants);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::payment::PaymentState;

    #[test]
    fn helpers_are_self_consistent() {
        json_string_roundtrip_proptest::<PaymentState>();
        fromstr_display_roundtrip_proptest::<PaymentState>();
    }
}
