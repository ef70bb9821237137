//! Calculation stages of the combination search.
//!
//! This module contains the pure functions the engine chains for one claim:
//! exclusion resolution, candidate enumeration, minimum-tax settlement with
//! surtax, and ranking. Each stage returns a result struct that carries an
//! [`AuditStep`](crate::models::AuditStep) for the run trace.

mod enumeration;
mod exclusion;
mod min_tax;
mod ranking;
mod settlement;
mod surtax;
mod truncation;

pub use enumeration::{
    Deadline, ENUMERATION_RULE_ID, EnumerationResult, MAX_EXACT_ITEMS, enumerate_combinations,
};
pub use exclusion::{
    EXCLUSION_RULE_ID, ExclusionPair, ExclusionResolution, resolve_exclusions, violates_any,
};
pub use min_tax::{
    DEFAULT_MIN_TAX_PERCENT, DEFAULT_SME_MIN_TAX_PERCENT, MinTaxRate, RdAllowance,
    minimum_tax_amount, rd_room_allowance, resolve_min_tax_rate,
};
pub use ranking::{
    RANKING_RULE_ID, RankingResult, combo_id, empty_combination, rank_candidates, verify_id,
};
pub use settlement::{
    CARRYFORWARD_MAX_YEARS, CONVERGENCE_TOLERANCE, MAX_SETTLEMENT_PASSES, SETTLEMENT_LEGAL_REF,
    SETTLEMENT_RULE_ID, SettlementContext, SettlementResult, settle_candidate,
};
pub use surtax::{DEFAULT_SURTAX_PERCENT, calculate_surtax};
pub use truncation::{
    AMOUNT_UNIT, AmountOverflow, apply_rate_percent, truncate_amount, truncate_to_unit,
};
