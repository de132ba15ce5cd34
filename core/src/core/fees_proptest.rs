//! Property tests for `convex_fee` (§8 invariant 3): the fee must stay
//! non-negative, monotonic in quantity, and never exceed the notional it's
//! charged against.

use super::convex_fee;
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    #[test]
    fn prop_fee_is_never_negative(price in 0u8..=100, qty in 1u32..1000) {
        prop_assert!(convex_fee(price, qty) >= Decimal::ZERO);
    }

    #[test]
    fn prop_fee_is_zero_at_the_price_bounds(qty in 1u32..1000) {
        prop_assert_eq!(convex_fee(0, qty), Decimal::ZERO);
        prop_assert_eq!(convex_fee(100, qty), Decimal::ZERO);
    }

    #[test]
    fn prop_fee_grows_with_quantity(price in 1u8..=99, qty in 1u32..500) {
        let smaller = convex_fee(price, qty);
        let larger = convex_fee(price, qty + 1);
        prop_assert!(larger >= smaller);
    }

    #[test]
    fn prop_fee_never_exceeds_notional(price in 0u8..=100, qty in 1u32..1000) {
        let fee = convex_fee(price, qty);
        let notional = Decimal::from(qty) * Decimal::from(price) / Decimal::from(100);
        prop_assert!(fee <= notional + Decimal::ONE);
    }
}
