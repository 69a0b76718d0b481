//! Fixed-point quote normalization
//!
//! The broker API encodes every numeric value as an integer `units` part plus
//! a `nano` part scaled by 10^-9. All money arithmetic in this crate runs on
//! `Decimal`; floats appear only when formatting output.

use rust_decimal::Decimal;

const NANOS_PER_UNIT: i64 = 1_000_000_000;

/// Convert a (units, nanos) fixed-point pair into an exact decimal.
///
/// `quotation_to_decimal(10, 500_000_000)` is exactly `10.5`.
pub fn quotation_to_decimal(units: i64, nanos: i32) -> Decimal {
    Decimal::from(units) + Decimal::from(nanos) / Decimal::from(NANOS_PER_UNIT)
}

/// Money values share the quotation encoding; the currency code travels
/// separately on the wire and is kept by the caller.
pub fn money_value_to_decimal(units: i64, nanos: i32) -> Decimal {
    quotation_to_decimal(units, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_whole_units() {
        assert_eq!(quotation_to_decimal(42, 0), dec!(42));
    }

    #[test]
    fn test_half_unit() {
        assert_eq!(quotation_to_decimal(10, 500_000_000), dec!(10.5));
    }

    #[test]
    fn test_single_nano_is_exact() {
        // 1e-9 has no exact binary float representation; Decimal keeps it exact
        assert_eq!(quotation_to_decimal(0, 1), dec!(0.000000001));
    }

    #[test]
    fn test_negative_value() {
        assert_eq!(quotation_to_decimal(-3, -250_000_000), dec!(-3.25));
    }

    #[test]
    fn test_money_value_matches_quotation() {
        assert_eq!(
            money_value_to_decimal(199, 990_000_000),
            quotation_to_decimal(199, 990_000_000)
        );
        assert_eq!(money_value_to_decimal(199, 990_000_000), dec!(199.99));
    }
}
