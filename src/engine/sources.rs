//! Upstream claim records consumed by the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::{ClaimBasic, EligibilityDiagnosis, EligibleItem, EntitySize, FinancialInfo};

/// Read access to the records earlier pipeline stages produced for a claim.
pub trait ClaimSource: Send + Sync {
    /// Basic tax-base figures of the claim.
    fn basic(&self, claim_id: &str) -> Result<Option<ClaimBasic>, SourceError>;
    /// Financial statement summary of the claim.
    fn financial(&self, claim_id: &str) -> Result<Option<FinancialInfo>, SourceError>;
    /// Eligibility diagnosis of the claim.
    fn eligibility(&self, claim_id: &str) -> Result<Option<EligibilityDiagnosis>, SourceError>;
    /// All priced items of the claim, whatever their status.
    fn eligible_items(&self, claim_id: &str) -> Result<Vec<EligibleItem>, SourceError>;
}

/// Error enumeration for claim source failures.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backing store could not be read.
    #[error("claim source unavailable: {0}")]
    Unavailable(String),
}

/// Every record of one claim.
#[derive(Debug, Clone, Default)]
pub struct ClaimRecords {
    /// Basic tax-base figures.
    pub basic: Option<ClaimBasic>,
    /// Financial statement summary.
    pub financial: Option<FinancialInfo>,
    /// Eligibility diagnosis.
    pub eligibility: Option<EligibilityDiagnosis>,
    /// Priced items.
    pub items: Vec<EligibleItem>,
}

impl ClaimRecords {
    /// Creates the complete record set of a claim.
    pub fn new(basic: ClaimBasic, items: Vec<EligibleItem>) -> Self {
        let claim_id = basic.claim_id.clone();
        let sme_eligible = basic.entity_size == EntitySize::Sme;
        Self {
            financial: Some(FinancialInfo {
                claim_id: claim_id.clone(),
                business_income: basic.taxable_income,
                determined_tax: basic.computed_tax,
            }),
            eligibility: Some(EligibilityDiagnosis {
                claim_id,
                deadline_eligible: true,
                sme_eligible,
            }),
            basic: Some(basic),
            items,
        }
    }
}

/// Claim source backed by a shared in-memory map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryClaimSource {
    claims: Arc<Mutex<HashMap<String, ClaimRecords>>>,
}

impl InMemoryClaimSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the records of a claim, replacing any earlier records.
    pub fn insert(&self, claim_id: impl Into<String>, records: ClaimRecords) -> Result<(), SourceError> {
        self.with_claims(|claims| {
            claims.insert(claim_id.into(), records);
        })
    }

    fn with_claims<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, ClaimRecords>) -> T,
    ) -> Result<T, SourceError> {
        let mut guard = self
            .claims
            .lock()
            .map_err(|_| SourceError::Unavailable("claim source mutex poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl ClaimSource for InMemoryClaimSource {
    fn basic(&self, claim_id: &str) -> Result<Option<ClaimBasic>, SourceError> {
        self.with_claims(|claims| claims.get(claim_id).and_then(|r| r.basic.clone()))
    }

    fn financial(&self, claim_id: &str) -> Result<Option<FinancialInfo>, SourceError> {
        self.with_claims(|claims| claims.get(claim_id).and_then(|r| r.financial.clone()))
    }

    fn eligibility(&self, claim_id: &str) -> Result<Option<EligibilityDiagnosis>, SourceError> {
        self.with_claims(|claims| claims.get(claim_id).and_then(|r| r.eligibility.clone()))
    }

    fn eligible_items(&self, claim_id: &str) -> Result<Vec<EligibleItem>, SourceError> {
        self.with_claims(|claims| {
            claims
                .get(claim_id)
                .map(|r| r.items.clone())
                .unwrap_or_default()
        })
    }
}
