//! Minimum-tax rate resolution and the R&D special allowance.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::ReferenceTables;
use crate::models::{EligibleItem, EntitySize, RdTier};

use super::truncation::{AmountOverflow, apply_rate_percent, truncate_amount};

/// Default minimum-tax rate of small and medium entities.
pub const DEFAULT_SME_MIN_TAX_PERCENT: Decimal = Decimal::from_parts(7, 0, 0, false, 0);

/// Default minimum-tax rate of every other entity.
pub const DEFAULT_MIN_TAX_PERCENT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// A resolved minimum-tax rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinTaxRate {
    /// The rate in percent.
    pub percent: Decimal,
    /// True if no bracket matched and the default was used.
    pub defaulted: bool,
}

/// Looks up the minimum-tax rate by entity size and tax base.
///
/// Falls back to 7% for small and medium entities and 10% otherwise when no
/// bracket covers the base.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::resolve_min_tax_rate;
/// use refund_combination_engine::config::ReferenceTables;
/// use refund_combination_engine::models::EntitySize;
/// use rust_decimal::Decimal;
///
/// let rate = resolve_min_tax_rate(&ReferenceTables::default(), EntitySize::Sme, 1_000);
/// assert_eq!(rate.percent, Decimal::new(7, 0));
/// assert!(rate.defaulted);
/// ```
pub fn resolve_min_tax_rate(
    tables: &ReferenceTables,
    entity_size: EntitySize,
    tax_base: i64,
) -> MinTaxRate {
    match tables.min_tax_percent(entity_size, tax_base) {
        Some(percent) => MinTaxRate {
            percent,
            defaulted: false,
        },
        None => {
            let percent = match entity_size {
                EntitySize::Sme => DEFAULT_SME_MIN_TAX_PERCENT,
                EntitySize::MidSized | EntitySize::Large => DEFAULT_MIN_TAX_PERCENT,
            };
            debug!(?entity_size, tax_base, %percent, "No minimum-tax bracket, using default rate");
            MinTaxRate {
                percent,
                defaulted: true,
            }
        }
    }
}

/// Computes the minimum-tax amount: computed tax × rate, truncated to whole
/// units and then to the amount granularity.
pub fn minimum_tax_amount(computed_tax: i64, rate: &MinTaxRate) -> Result<i64, AmountOverflow> {
    Ok(truncate_amount(apply_rate_percent(computed_tax, rate.percent)?))
}

/// Room released by the R&D special allowance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdAllowance {
    /// Total room released, after the cap.
    pub released: i64,
    /// Room released per tier, in priority order, before the cap.
    pub by_tier: Vec<(RdTier, i64)>,
}

/// Computes the deductible room released by R&D credits in the combination.
///
/// Tiers are processed in [`RdTier::PRIORITY`] order. Each R&D item releases
/// its gross amount × the tier's exemption percentage for the entity size;
/// without a matching rule the tier's statutory percentage applies. The total
/// is truncated to the amount granularity and never exceeds the minimum-tax
/// amount, since the allowance can at most lift the floor entirely.
pub fn rd_room_allowance(
    items: &[EligibleItem],
    entity_size: EntitySize,
    min_tax_amount: i64,
    tables: &ReferenceTables,
) -> Result<RdAllowance, AmountOverflow> {
    let mut by_tier = Vec::new();
    let mut total: i64 = 0;

    for tier in RdTier::PRIORITY {
        let tier_items: Vec<&EligibleItem> = items
            .iter()
            .filter(|item| item.rd_tier == Some(tier))
            .collect();
        if tier_items.is_empty() {
            continue;
        }

        let percent = tables
            .rd_exempt_percent(tier, entity_size)
            .unwrap_or_else(|| tier.statutory_exempt_percent());

        let mut tier_total: i64 = 0;
        for item in tier_items {
            let released = apply_rate_percent(item.gross_amount, percent)?;
            tier_total = tier_total.saturating_add(released);
        }
        total = total.saturating_add(tier_total);
        by_tier.push((tier, tier_total));
    }

    let released = truncate_amount(total).min(min_tax_amount.max(0));
    Ok(RdAllowance { released, by_tier })
}
