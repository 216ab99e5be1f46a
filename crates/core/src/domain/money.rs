use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 2;

/// Rounds to two decimals, ties away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts through the shortest decimal rendering of `value`, so `0.1` becomes `0.1`
/// rather than its binary expansion. Non-finite input yields `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{decimal_from_f64, round_money};

    #[test]
    fn rounds_half_up_at_two_decimals() {
        assert_eq!(round_money(Decimal::new(25155, 3)), Decimal::new(2516, 2));
        assert_eq!(round_money(Decimal::new(25154, 3)), Decimal::new(2515, 2));
        assert_eq!(round_money(Decimal::new(-25155, 3)), Decimal::new(-2516, 2));
    }

    #[test]
    fn float_conversion_uses_shortest_rendering() {
        assert_eq!(decimal_from_f64(0.1), Some(Decimal::new(1, 1)));
        assert_eq!(decimal_from_f64(180.0), Some(Decimal::from(180)));
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }
}
