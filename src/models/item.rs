//! Eligible item model and related types.
//!
//! An [`EligibleItem`] is a tax credit or exemption that the upstream credit
//! calculation stage has already priced. The combination engine never changes
//! an item; it only decides which items are applied together.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether an item reduces tax as an exemption or as a credit.
///
/// Exemptions are always applied before credits, and any excess beyond the
/// deductible room expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// A tax exemption (reduction).
    Exemption,
    /// A tax credit.
    Credit,
}

/// The R&D category of a credit, used for the minimum-tax special allowance.
///
/// The declaration order is the statutory priority order in which tiers
/// release deductible room.
///
/// # Example
///
/// ```
/// use refund_combination_engine::models::RdTier;
/// use rust_decimal::Decimal;
///
/// assert_eq!(RdTier::PRIORITY[0], RdTier::NationalStrategic);
/// assert_eq!(RdTier::GeneralSme.statutory_exempt_percent(), Decimal::new(50, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RdTier {
    /// National strategic technology R&D.
    NationalStrategic,
    /// New-growth / source technology R&D of a small or medium entity.
    NewGrowthSme,
    /// General R&D of a small or medium entity.
    GeneralSme,
}

impl RdTier {
    /// The tiers in the order they are applied.
    pub const PRIORITY: [RdTier; 3] = [
        RdTier::NationalStrategic,
        RdTier::NewGrowthSme,
        RdTier::GeneralSme,
    ];

    /// The percentage of gross amount exempted from the minimum-tax ceiling
    /// when the reference table has no rule for the tier.
    pub fn statutory_exempt_percent(&self) -> Decimal {
        match self {
            RdTier::NationalStrategic | RdTier::NewGrowthSme => Decimal::ONE_HUNDRED,
            RdTier::GeneralSme => Decimal::new(50, 0),
        }
    }
}

/// The status assigned to an item by the credit calculation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item may be applied.
    Applicable,
    /// The item was rejected upstream and is ignored by the search.
    NotApplicable,
}

/// A priced credit or exemption the claimant is statutorily eligible for.
///
/// # Example
///
/// ```
/// use refund_combination_engine::models::{EligibleItem, ItemKind};
///
/// let item = EligibleItem::new("ITEM-01", "ART-7", ItemKind::Exemption, 1_000);
/// assert!(item.is_applicable());
/// assert_eq!(item.greedy_key(), 1_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleItem {
    /// Unique identifier of the item within the claim.
    pub item_id: String,
    /// Human-readable name of the item.
    #[serde(default)]
    pub name: String,
    /// The legal provision code the item is claimed under.
    pub provision: String,
    /// Exemption or credit.
    pub kind: ItemKind,
    /// Upstream applicability status.
    #[serde(default = "default_status")]
    pub status: ItemStatus,
    /// Gross amount in whole currency units. Never negative.
    pub gross_amount: i64,
    /// Net deduction amount already known upstream, used to order the greedy
    /// fallback. The gross amount is used when absent.
    #[serde(default)]
    pub net_amount: Option<i64>,
    /// Whether the unused part of the credit may be carried forward.
    #[serde(default)]
    pub carryforward: bool,
    /// R&D tier of the item, if it is an R&D credit.
    #[serde(default)]
    pub rd_tier: Option<RdTier>,
    /// Whether the item is exempt from the special surtax.
    #[serde(default)]
    pub surtax_exempt: bool,
    /// Legal citation for the item.
    #[serde(default)]
    pub legal_basis: String,
}

fn default_status() -> ItemStatus {
    ItemStatus::Applicable
}

impl EligibleItem {
    /// Creates an applicable, non-carryforward, surtax-liable item.
    pub fn new(
        item_id: impl Into<String>,
        provision: impl Into<String>,
        kind: ItemKind,
        gross_amount: i64,
    ) -> Self {
        let item_id = item_id.into();
        Self {
            name: item_id.clone(),
            item_id,
            provision: provision.into(),
            kind,
            status: ItemStatus::Applicable,
            gross_amount,
            net_amount: None,
            carryforward: false,
            rd_tier: None,
            surtax_exempt: false,
            legal_basis: String::new(),
        }
    }

    /// Marks the item as carryforward-eligible.
    pub fn with_carryforward(mut self) -> Self {
        self.carryforward = true;
        self
    }

    /// Sets the R&D tier of the item.
    pub fn with_rd_tier(mut self, tier: RdTier) -> Self {
        self.rd_tier = Some(tier);
        self
    }

    /// Marks the item as exempt from the special surtax.
    pub fn with_surtax_exempt(mut self) -> Self {
        self.surtax_exempt = true;
        self
    }

    /// Sets the net deduction amount known upstream.
    pub fn with_net_amount(mut self, net_amount: i64) -> Self {
        self.net_amount = Some(net_amount);
        self
    }

    /// Returns true if the item may take part in the search.
    pub fn is_applicable(&self) -> bool {
        self.status == ItemStatus::Applicable
    }

    /// The amount the greedy fallback sorts by.
    pub fn greedy_key(&self) -> i64 {
        self.net_amount.unwrap_or(self.gross_amount)
    }
}
