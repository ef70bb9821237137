//! Special surtax calculation.
//!
//! The surtax is levied on the applied amount of each credit or exemption,
//! unless the item or its provision is exempt.

use rust_decimal::Decimal;

use crate::config::ReferenceTables;
use crate::models::EligibleItem;

use super::truncation::{AmountOverflow, apply_rate_percent, truncate_amount};

/// The rate applied when no surtax rule matches the provision.
pub const DEFAULT_SURTAX_PERCENT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Calculates the surtax owed on an applied amount.
///
/// Returns 0 when the applied amount is not positive, when the item is marked
/// surtax-exempt, or when the provision's rule marks it exempt. Otherwise the
/// rule's rate applies, or [`DEFAULT_SURTAX_PERCENT`] when there is no rule or
/// the rule carries no rate. The result is truncated to the amount granularity.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::calculate_surtax;
/// use refund_combination_engine::config::ReferenceTables;
/// use refund_combination_engine::models::{EligibleItem, ItemKind};
///
/// let tables = ReferenceTables::default();
/// let item = EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000);
///
/// assert_eq!(calculate_surtax(&item, 1_000, &tables), Ok(200));
/// assert_eq!(calculate_surtax(&item.with_surtax_exempt(), 1_000, &tables), Ok(0));
/// ```
pub fn calculate_surtax(
    item: &EligibleItem,
    applied_amount: i64,
    tables: &ReferenceTables,
) -> Result<i64, AmountOverflow> {
    if applied_amount <= 0 || item.surtax_exempt {
        return Ok(0);
    }

    let rate = match tables.surtax_rule(&item.provision) {
        Some(rule) if rule.exempt => return Ok(0),
        Some(rule) => rule.rate_percent.unwrap_or(DEFAULT_SURTAX_PERCENT),
        None => DEFAULT_SURTAX_PERCENT,
    };

    Ok(truncate_amount(apply_rate_percent(applied_amount, rate)?))
}
