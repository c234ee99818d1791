//! Property tests for the fundamental types.

use custos_types::{Amount, CuAddress, Symbol};
use proptest::prelude::*;

proptest! {
    /// Checked addition agrees with the u128 reference whenever the
    /// reference does not overflow, and reports `None` exactly when it does.
    #[test]
    fn checked_add_matches_u128(a in any::<u128>(), b in any::<u128>()) {
        let sum = Amount::new(a).checked_add(Amount::new(b));
        match a.checked_add(b) {
            Some(expected) => prop_assert_eq!(sum, Some(Amount::new(expected))),
            None => prop_assert_eq!(sum, None),
        }
    }

    /// Subtracting what was added always round-trips.
    #[test]
    fn add_then_sub_round_trips(a in any::<u128>(), b in any::<u128>()) {
        prop_assume!(a.checked_add(b).is_some());
        let sum = Amount::new(a).checked_add(Amount::new(b)).unwrap();
        prop_assert_eq!(sum.checked_sub(Amount::new(b)), Some(Amount::new(a)));
    }

    /// Summing a whole sequence agrees with a fold of checked additions.
    #[test]
    fn checked_sum_matches_fold(raws in proptest::collection::vec(any::<u128>(), 0..8)) {
        let expected = raws
            .iter()
            .try_fold(0u128, |acc, &r| acc.checked_add(r))
            .map(Amount::new);
        let total = Amount::checked_sum(raws.iter().map(|&r| Amount::new(r)));
        prop_assert_eq!(total, expected);
    }

    /// A fee at or below 100% never exceeds the base amount.
    #[test]
    fn fee_never_exceeds_base(amount in any::<u128>(), rate in 0u128..=10_000) {
        if let Some(fee) = Amount::new(amount).checked_mul_bps(rate) {
            prop_assert!(fee <= Amount::new(amount));
        }
    }

    /// Amounts survive a serde round trip unchanged.
    #[test]
    fn amount_serde_round_trip(raw in any::<u128>()) {
        let amount = Amount::new(raw);
        let json = serde_json::to_string(&amount).unwrap();
        let back: Amount = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, amount);
    }

    /// Every lowercase alphanumeric string is a valid symbol and prints
    /// back verbatim.
    #[test]
    fn symbols_accept_lowercase_alnum(raw in "[a-z0-9]{1,12}") {
        let symbol = Symbol::new(raw.clone()).unwrap();
        prop_assert_eq!(symbol.as_str(), raw.as_str());
    }

    /// Constructing and wire-decoding a CU address enforce the same rule:
    /// anything without a `cu_` prefix and a non-empty body is rejected on
    /// both paths.
    #[test]
    fn cu_address_validation_is_uniform(raw in "[a-z0-9_]{0,16}") {
        let constructed = CuAddress::new(raw.clone());
        let decoded: Result<CuAddress, _> =
            serde_json::from_str(&format!("\"{raw}\""));
        prop_assert_eq!(constructed.is_ok(), decoded.is_ok());
        prop_assert_eq!(
            constructed.is_ok(),
            raw.starts_with("cu_") && raw.len() > 3
        );
    }
}
