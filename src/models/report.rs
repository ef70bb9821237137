//! Ranked result models for the combination search.
//!
//! This module contains the [`CombinationReport`] type and the structures it
//! carries: ranked combinations, exclusion-verification records and the
//! audit trace of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApplicationEntry, CarryforwardEntry, SettlementTotals};

/// Classification of a ranked combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombinationGroup {
    /// The rank-1 combination.
    Optimal,
    /// Any other combination.
    Alternative,
    /// The placeholder emitted when the claim has no eligible items.
    Empty,
}

/// How the candidate set of a run was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SearchStrategy {
    /// No eligible items; settlement was skipped.
    Empty,
    /// Every subset of the exclusion-involved items was examined.
    Exact {
        /// True if the deadline stopped the enumeration early.
        deadline_exceeded: bool,
    },
    /// A single descending-amount greedy pass.
    Greedy,
}

/// A settled combination with its rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCombination {
    /// Identifier derived from the rank, e.g. `COMBO-001`.
    pub combo_id: String,
    /// Rank by net refund, starting at 1.
    pub rank: usize,
    /// Optimal, alternative or empty.
    pub group: CombinationGroup,
    /// Human-readable label.
    pub name: String,
    /// Identifiers of the items in the combination.
    pub item_ids: Vec<String>,
    /// Settled totals.
    pub totals: SettlementTotals,
    /// Ordered application trace.
    pub application_order: Vec<ApplicationEntry>,
    /// Credits carried forward.
    pub carryforwards: Vec<CarryforwardEntry>,
    /// Settlement passes run before convergence.
    pub passes: u32,
}

/// Audit record showing whether an effective exclusion pair was violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionVerification {
    /// Identifier of the record, e.g. `EXCL-001`.
    pub verify_id: String,
    /// The combination the record is reported against.
    pub combo_id: String,
    /// First provision of the pair.
    pub provision_a: String,
    /// Second provision of the pair.
    pub provision_b: String,
    /// Whether the pair may be applied together. Always false for effective pairs.
    pub overlap_allowed: bool,
    /// Condition note from the exclusion rule.
    pub condition_note: String,
    /// Whether any ranked combination contains both provisions.
    pub violation_detected: bool,
    /// Legal citation of the exclusion rule.
    pub legal_basis: String,
}

/// A single step in the audit trace recording a calculation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// Legal reference for the rule.
    pub legal_ref: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// A warning generated during the search.
///
/// Warnings flag degraded behaviour that did not stop the run, such as a
/// reference-table miss or a deadline overrun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level (e.g., "low", "medium", "high").
    pub severity: String,
}

/// The complete audit trace for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of calculation steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during the run.
    pub warnings: Vec<AuditWarning>,
    /// The total run duration in microseconds.
    pub duration_us: u64,
}

/// The complete result of one combination search.
///
/// # Example
///
/// ```
/// use refund_combination_engine::models::{AuditTrace, CombinationReport, SearchStrategy};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let report = CombinationReport {
///     calculation_id: Uuid::new_v4(),
///     timestamp: Utc::now(),
///     engine_version: "0.1.0".to_string(),
///     claim_id: "REQ-001".to_string(),
///     strategy: SearchStrategy::Empty,
///     combinations: vec![],
///     verifications: vec![],
///     audit_trace: AuditTrace::default(),
/// };
/// assert!(report.optimal().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationReport {
    /// Unique identifier for this run.
    pub calculation_id: Uuid,
    /// When the run was performed.
    pub timestamp: DateTime<Utc>,
    /// The version of the engine that performed the run.
    pub engine_version: String,
    /// The claim the run is for.
    pub claim_id: String,
    /// How candidates were produced.
    pub strategy: SearchStrategy,
    /// Combinations ordered by rank.
    pub combinations: Vec<RankedCombination>,
    /// One record per effective exclusion pair.
    pub verifications: Vec<ExclusionVerification>,
    /// Audit trace of the run.
    pub audit_trace: AuditTrace,
}

impl CombinationReport {
    /// Returns the rank-1 combination, if any.
    pub fn optimal(&self) -> Option<&RankedCombination> {
        self.combinations.first()
    }
}
