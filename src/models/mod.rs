//! Core data models for the refund combination engine.
//!
//! This module contains all the domain models used throughout the engine.

mod claim;
mod combination;
mod item;
mod report;

pub use claim::{ClaimBasic, EligibilityDiagnosis, EntitySize, FinancialInfo, TaxType};
pub use combination::{
    ApplicationEntry, ApplicationStage, Candidate, CarryforwardEntry, SettledCandidate,
    Settlement, SettlementTotals,
};
pub use item::{EligibleItem, ItemKind, ItemStatus, RdTier};
pub use report::{
    AuditStep, AuditTrace, AuditWarning, CombinationGroup, CombinationReport,
    ExclusionVerification, RankedCombination, SearchStrategy,
};
