use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to 2 decimals, half-up (midpoint away from zero).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// VAT due on `base` at `rate` percent, rounded with [`round_money`].
pub fn vat_amount(base: Decimal, rate: Decimal) -> Decimal {
    round_money(base * rate / Decimal::ONE_HUNDRED)
}

/// `part` as a percentage of `whole`, rounded to 2 decimals.
/// A zero `whole` yields zero.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_money(part * Decimal::ONE_HUNDRED / whole)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn vat_on_base() {
        assert_eq!(vat_amount(dec!(100), dec!(20)), dec!(20.00));
        assert_eq!(vat_amount(dec!(33.33), dec!(21)), dec!(7.00));
        assert_eq!(vat_amount(dec!(10.05), dec!(25.5)), dec!(2.56));
    }

    #[test]
    fn percentage() {
        assert_eq!(percentage_of(dec!(8000), dec!(10000)), dec!(80.00));
        assert_eq!(percentage_of(dec!(9999), dec!(10000)), dec!(99.99));
        assert_eq!(percentage_of(dec!(5), dec!(0)), Decimal::ZERO);
    }
}
