//! Candidate combination models.
//!
//! A [`Candidate`] is created by the enumerator and consumed by the settlement
//! calculator, which turns it into a [`SettledCandidate`] carrying the totals
//! and the ordered application trace. Candidates are owned values and are
//! never shared between runs.

use serde::{Deserialize, Serialize};

use super::{EligibleItem, ItemKind};

/// The statutory stage an item is applied in.
///
/// Stages are applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStage {
    /// Exemptions; excess beyond the room expires.
    Exemption,
    /// Credits that cannot be carried forward; excess expires.
    NonCarryforwardCredit,
    /// Credits that can be carried forward; excess is carried.
    CarryforwardCredit,
}

impl ApplicationStage {
    /// Classifies an item into its application stage.
    pub fn of(item: &EligibleItem) -> Self {
        match (item.kind, item.carryforward) {
            (ItemKind::Exemption, _) => ApplicationStage::Exemption,
            (ItemKind::Credit, false) => ApplicationStage::NonCarryforwardCredit,
            (ItemKind::Credit, true) => ApplicationStage::CarryforwardCredit,
        }
    }
}

/// A set of items that satisfies every exclusion constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Discovery order of the candidate, starting at 1.
    pub sequence: usize,
    /// Items in the combination: independent items first, then the selected
    /// exclusion-involved items.
    pub items: Vec<EligibleItem>,
}

impl Candidate {
    /// Creates a candidate from its discovery sequence and items.
    pub fn new(sequence: usize, items: Vec<EligibleItem>) -> Self {
        Self { sequence, items }
    }

    /// Sum of the gross amounts of all items.
    pub fn gross_total(&self) -> i64 {
        self.items.iter().map(|item| item.gross_amount).sum()
    }

    /// Returns true if the candidate contains an item under the provision.
    pub fn contains_provision(&self, provision: &str) -> bool {
        self.items.iter().any(|item| item.provision == provision)
    }

    /// The item identifiers in combination order.
    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.item_id.clone()).collect()
    }
}

/// How one item was applied during settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEntry {
    /// The item identifier.
    pub item_id: String,
    /// The provision of the item.
    pub provision: String,
    /// The stage the item was applied in.
    pub stage: ApplicationStage,
    /// The gross amount of the item.
    pub gross_amount: i64,
    /// The amount deducted this period.
    pub applied_amount: i64,
    /// The amount lost because the room was exhausted.
    pub expired_amount: i64,
    /// The amount carried to future periods.
    pub carryforward_amount: i64,
    /// Surtax owed on the applied amount.
    pub surtax_amount: i64,
}

/// A credit amount carried forward to future periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryforwardEntry {
    /// The item identifier.
    pub item_id: String,
    /// The provision of the item.
    pub provision: String,
    /// The amount carried forward.
    pub amount: i64,
    /// The number of years the amount may be carried.
    pub max_years: u32,
}

/// Settled totals of a combination.
///
/// All amounts are in whole currency units, truncated to the 10-unit amount
/// granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    /// Total exemption applied.
    pub exemption_total: i64,
    /// Total credit applied.
    pub credit_total: i64,
    /// Gross total minus applied total.
    pub min_tax_adjustment: i64,
    /// Total surtax on applied amounts.
    pub surtax_total: i64,
    /// Total carried forward.
    pub carryforward_total: i64,
    /// Applied total minus surtax.
    pub net_refund: i64,
}

/// The full settlement of a combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Settled totals.
    pub totals: SettlementTotals,
    /// Minimum-tax amount of the claim.
    pub min_tax_amount: i64,
    /// Deductible room before any item is applied.
    pub deductible_room: i64,
    /// Room released by the R&D special allowance.
    pub rd_room_released: i64,
    /// Per-item application trace, in statutory order.
    pub application_order: Vec<ApplicationEntry>,
    /// Credits carried forward.
    pub carryforwards: Vec<CarryforwardEntry>,
    /// Number of settlement passes run before convergence.
    pub passes: u32,
}

/// A candidate together with its settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledCandidate {
    /// The settled candidate.
    pub candidate: Candidate,
    /// Its settlement.
    pub settlement: Settlement,
}

impl SettledCandidate {
    /// The net refund ranking is based on.
    pub fn net_refund(&self) -> i64 {
        self.settlement.totals.net_refund
    }
}
