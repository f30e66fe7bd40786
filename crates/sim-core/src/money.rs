//! Exact decimal money and quantity helpers.
//!
//! All monetary amounts, quantities, reputation and satisfaction values are
//! `rust_decimal::Decimal`. Binary floats never touch money; `f64` is used
//! only for dimensionless scores and multipliers.

use rust_decimal::Decimal;

/// Monetary amount. Exact decimal, 4 fractional digits of working precision.
pub type Money = Decimal;

/// Fractional digits kept on intermediate monetary values.
pub const INTERMEDIATE_DP: u32 = 4;

/// Fractional digits shown to users (banker's rounding).
pub const DISPLAY_DP: u32 = 2;

/// Round an intermediate amount to 4 fractional digits.
pub fn round_intermediate(amount: Money) -> Money {
    amount.round_dp(INTERMEDIATE_DP)
}

/// Round an amount for display to 2 fractional digits.
///
/// `round_dp` applies midpoint-nearest-even, so displayed money never drifts
/// from repeated formatting.
pub fn round_display(amount: Money) -> Money {
    amount.round_dp(DISPLAY_DP)
}

/// Net (HT) price from a gross (TTC) price at the given VAT rate.
///
/// Returns zero when the divisor would not be positive.
pub fn ht_from_ttc(ttc: Money, vat_rate: Decimal) -> Money {
    let divisor = Decimal::ONE + vat_rate;
    if divisor <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_intermediate(ttc / divisor)
}
