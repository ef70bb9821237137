//! Currency truncation helpers.
//!
//! Every amount the engine produces is truncated toward zero. Nothing is ever
//! rounded up.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// The amount granularity, in whole currency units.
pub const AMOUNT_UNIT: i64 = 10;

/// An amount computation left the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount {amount} x {rate_percent}% is out of range")]
pub struct AmountOverflow {
    /// The amount being scaled.
    pub amount: i64,
    /// The rate applied, in percent.
    pub rate_percent: Decimal,
}

/// Truncates an amount toward zero to a multiple of `unit`.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::truncate_to_unit;
///
/// assert_eq!(truncate_to_unit(1234, 10), 1230);
/// assert_eq!(truncate_to_unit(5, 10), 0);
/// assert_eq!(truncate_to_unit(-1234, 10), -1230);
/// ```
pub fn truncate_to_unit(amount: i64, unit: i64) -> i64 {
    if unit <= 1 {
        return amount;
    }
    // Integer division in Rust already truncates toward zero.
    (amount / unit) * unit
}

/// Truncates an amount toward zero to the 10-unit amount granularity.
pub fn truncate_amount(amount: i64) -> i64 {
    truncate_to_unit(amount, AMOUNT_UNIT)
}

/// Computes `amount × rate_percent / 100`, truncated to whole units.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::apply_rate_percent;
/// use rust_decimal::Decimal;
///
/// assert_eq!(apply_rate_percent(999, Decimal::new(20, 0)), Ok(199));
/// assert_eq!(apply_rate_percent(1_000, Decimal::new(75, 1)), Ok(75));
/// ```
pub fn apply_rate_percent(amount: i64, rate_percent: Decimal) -> Result<i64, AmountOverflow> {
    let overflow = AmountOverflow {
        amount,
        rate_percent,
    };

    Decimal::from(amount)
        .checked_mul(rate_percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .map(|value| value.trunc())
        .and_then(|value| value.to_i64())
        .ok_or(overflow)
}
