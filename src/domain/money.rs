//! Monetary arithmetic for cart and reservation totals.
//!
//! All prices are [`Decimal`] end to end; nothing in the booking path
//! touches floating point. Amounts are rounded to two decimal places,
//! half-up, matching the NUMERIC(10,2) columns they are stored in.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on every monetary value.
const MONEY_SCALE: u32 = 2;

/// Subtotal, tax, and grand total of a priced line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    /// Sum of all line subtotals.
    pub subtotal: Decimal,
    /// `subtotal × tax_rate`, rounded.
    pub tax: Decimal,
    /// `subtotal + tax`.
    pub total: Decimal,
}

/// Rounds a monetary value to two decimal places, half-up.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the subtotal of a single line: `unit_price × quantity`.
#[must_use]
pub fn line_subtotal(unit_price: Decimal, quantity: i32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Computes cart totals from line subtotals at the given tax rate.
#[must_use]
pub fn compute_totals<I>(line_subtotals: I, tax_rate: Decimal) -> Totals
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal: Decimal = line_subtotals.into_iter().sum();
    let subtotal = round_money(subtotal);
    let tax = round_money(subtotal * tax_rate);
    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().ok().unwrap_or_else(|| panic!("bad decimal {s}"))
    }

    #[test]
    fn single_line_at_twelve_percent() {
        // 100.00 × 1 → 12.00 tax, 112.00 total
        let totals = compute_totals([line_subtotal(dec("100.00"), 1)], dec("0.12"));
        assert_eq!(totals.subtotal, dec("100.00"));
        assert_eq!(totals.tax, dec("12.00"));
        assert_eq!(totals.total, dec("112.00"));
    }

    #[test]
    fn quantity_multiplies_before_tax() {
        let totals = compute_totals([line_subtotal(dec("19.99"), 3)], dec("0.12"));
        assert_eq!(totals.subtotal, dec("59.97"));
        assert_eq!(totals.tax, dec("7.20"));
        assert_eq!(totals.total, dec("67.17"));
    }

    #[test]
    fn tax_rounds_half_up() {
        // 10.375 × 0.12 = 1.245 → 1.25 with half-up rounding
        let totals = compute_totals([dec("10.375")], dec("0.12"));
        assert_eq!(totals.subtotal, dec("10.38"));
        assert_eq!(totals.tax, dec("1.25"));
    }

    #[test]
    fn multiple_lines_sum() {
        let lines = [
            line_subtotal(dec("45.50"), 2),
            line_subtotal(dec("120.00"), 1),
        ];
        let totals = compute_totals(lines, dec("0.12"));
        assert_eq!(totals.subtotal, dec("211.00"));
        assert_eq!(totals.tax, dec("25.32"));
        assert_eq!(totals.total, dec("236.32"));
    }

    #[test]
    fn empty_cart_is_all_zero() {
        let totals = compute_totals([], dec("0.12"));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
