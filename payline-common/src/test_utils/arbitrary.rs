//! Shared proptest strategies.

use proptest::strategy::Strategy;

/// A strategy for valid client-chosen identifiers (`[A-Za-z0-9_-]{1,16}`),
/// used by the `Arbitrary` impls for the id newtypes.
pub fn any_identifier() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_-]{1,16}")
        .expect("Valid regex")
}
