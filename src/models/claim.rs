//! Claim intake records consumed by the combination search.

use serde::{Deserialize, Serialize};

/// The tax the claim is filed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// Corporate income tax.
    Corporate,
    /// Individual income tax.
    Individual,
}

/// Size category of the claimant, which selects rate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySize {
    /// Small or medium entity.
    Sme,
    /// Mid-sized entity.
    MidSized,
    /// Large entity.
    Large,
}

/// Basic tax-base figures of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBasic {
    /// The claim identifier.
    pub claim_id: String,
    /// Corporate or individual claim.
    pub tax_type: TaxType,
    /// Size category of the claimant.
    pub entity_size: EntitySize,
    /// The tax year the claim belongs to.
    pub tax_year: i32,
    /// Taxable income in whole currency units.
    pub taxable_income: i64,
    /// Computed tax before any credit or exemption.
    pub computed_tax: i64,
}

impl ClaimBasic {
    /// The amount the minimum-tax bracket is looked up by.
    ///
    /// Corporate claims use taxable income, individual claims use computed tax.
    ///
    /// # Example
    ///
    /// ```
    /// use refund_combination_engine::models::{ClaimBasic, EntitySize, TaxType};
    ///
    /// let claim = ClaimBasic {
    ///     claim_id: "REQ-001".to_string(),
    ///     tax_type: TaxType::Individual,
    ///     entity_size: EntitySize::Sme,
    ///     tax_year: 2024,
    ///     taxable_income: 90_000,
    ///     computed_tax: 12_000,
    /// };
    /// assert_eq!(claim.tax_base(), 12_000);
    /// ```
    pub fn tax_base(&self) -> i64 {
        match self.tax_type {
            TaxType::Corporate => self.taxable_income,
            TaxType::Individual => self.computed_tax,
        }
    }
}

/// Financial statement summary of a claim.
///
/// The search only requires that it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialInfo {
    /// The claim identifier.
    pub claim_id: String,
    /// Business income in whole currency units.
    #[serde(default)]
    pub business_income: i64,
    /// Tax already determined for the period.
    #[serde(default)]
    pub determined_tax: i64,
}

/// Outcome of the eligibility pre-check for a claim.
///
/// The search only requires that it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDiagnosis {
    /// The claim identifier.
    pub claim_id: String,
    /// Whether the claim was filed within the deadline.
    #[serde(default)]
    pub deadline_eligible: bool,
    /// Whether small/medium entity treatment was confirmed.
    #[serde(default)]
    pub sme_eligible: bool,
}
