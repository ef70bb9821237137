//! Minimum-tax settlement of a candidate combination.
//!
//! Items are applied in statutory order against the deductible room left
//! above the minimum-tax floor:
//!
//! 1. exemptions, excess expires
//! 2. credits that cannot be carried forward, excess expires
//! 3. the R&D special allowance, which enlarges the remaining room
//! 4. carryforward credits, excess is carried for up to 10 years
//!
//! The four steps are re-run until the net refund of two consecutive passes
//! differs by at most [`CONVERGENCE_TOLERANCE`], for at most
//! [`MAX_SETTLEMENT_PASSES`] passes.

use tracing::debug;

use crate::config::ReferenceTables;
use crate::error::{CalculationStep, EngineError, EngineResult};
use crate::models::{
    ApplicationEntry, ApplicationStage, AuditStep, Candidate, CarryforwardEntry, ClaimBasic,
    EligibleItem, EntitySize, SettledCandidate, Settlement, SettlementTotals,
};

use super::min_tax::{MinTaxRate, minimum_tax_amount, rd_room_allowance, resolve_min_tax_rate};
use super::surtax::calculate_surtax;
use super::truncation::{AmountOverflow, truncate_amount};

/// Rule identifier recorded in the audit trace.
pub const SETTLEMENT_RULE_ID: &str = "minimum_tax_settlement";

/// Legal reference of the application order.
pub const SETTLEMENT_LEGAL_REF: &str = "Corporate Tax Act Art.59; Restriction of Special Taxation Act Art.132";

/// Maximum number of settlement passes.
pub const MAX_SETTLEMENT_PASSES: u32 = 5;

/// Net refund difference at which two passes are considered converged.
pub const CONVERGENCE_TOLERANCE: i64 = 1;

/// Years a carried-forward credit remains usable.
pub const CARRYFORWARD_MAX_YEARS: u32 = 10;

/// Claim figures the settlement depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementContext {
    /// The claim being settled.
    pub claim_id: String,
    /// Amount the minimum-tax bracket is looked up by.
    pub tax_base: i64,
    /// Computed tax before any credit or exemption.
    pub computed_tax: i64,
    /// Size category of the claimant.
    pub entity_size: EntitySize,
}

impl SettlementContext {
    /// Builds the context from the basic claim record.
    pub fn from_claim(claim: &ClaimBasic) -> Self {
        Self {
            claim_id: claim.claim_id.clone(),
            tax_base: claim.tax_base(),
            computed_tax: claim.computed_tax,
            entity_size: claim.entity_size,
        }
    }

    fn overflow(&self, err: AmountOverflow) -> EngineError {
        EngineError::calculation(&self.claim_id, CalculationStep::Settlement, err.to_string())
    }

    fn sum_overflow(&self) -> EngineError {
        EngineError::calculation(
            &self.claim_id,
            CalculationStep::Settlement,
            "amount total out of range",
        )
    }
}

/// The result of settling one candidate, including the audit step.
#[derive(Debug, Clone)]
pub struct SettlementResult {
    /// The candidate with its settlement.
    pub settled: SettledCandidate,
    /// The audit step recording this settlement.
    pub audit_step: AuditStep,
}

/// Outcome of a single application pass.
#[derive(Debug, Default)]
struct Pass {
    exemption_total: i64,
    credit_total: i64,
    surtax_total: i64,
    carryforward_total: i64,
    rd_room_released: i64,
    application_order: Vec<ApplicationEntry>,
    carryforwards: Vec<CarryforwardEntry>,
}

impl Pass {
    fn applied_total(&self) -> Option<i64> {
        self.exemption_total.checked_add(self.credit_total)
    }
}

/// Settles a candidate against the minimum-tax ceiling.
///
/// # Arguments
///
/// * `candidate` - The combination to settle
/// * `context` - Tax base, computed tax and entity size of the claim
/// * `tables` - Reference tables for rates, R&D shares and surtax rules
/// * `step_number` - The step number for audit trail sequencing
///
/// # Errors
///
/// Returns a settlement-tagged [`EngineError::Calculation`] if an amount
/// leaves the representable range.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::{SettlementContext, settle_candidate};
/// use refund_combination_engine::config::ReferenceTables;
/// use refund_combination_engine::models::{Candidate, EligibleItem, EntitySize, ItemKind};
///
/// let context = SettlementContext {
///     claim_id: "REQ-001".to_string(),
///     tax_base: 25_000,
///     computed_tax: 5_000,
///     entity_size: EntitySize::Large,
/// };
/// let candidate = Candidate::new(
///     1,
///     vec![EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000)],
/// );
///
/// let result = settle_candidate(candidate, &context, &ReferenceTables::default(), 4)?;
/// let settlement = &result.settled.settlement;
/// assert_eq!(settlement.min_tax_amount, 500);
/// assert_eq!(settlement.deductible_room, 4_500);
/// assert_eq!(settlement.totals.net_refund, 800);
/// # Ok::<(), refund_combination_engine::error::EngineError>(())
/// ```
pub fn settle_candidate(
    candidate: Candidate,
    context: &SettlementContext,
    tables: &ReferenceTables,
    step_number: u32,
) -> EngineResult<SettlementResult> {
    let rate = resolve_min_tax_rate(tables, context.entity_size, context.tax_base);
    let min_tax_amount =
        minimum_tax_amount(context.computed_tax, &rate).map_err(|e| context.overflow(e))?;
    let deductible_room = context
        .computed_tax
        .checked_sub(min_tax_amount)
        .ok_or_else(|| context.sum_overflow())?
        .max(0);

    let gross_total = candidate
        .items
        .iter()
        .try_fold(0i64, |acc, item| acc.checked_add(item.gross_amount))
        .ok_or_else(|| context.sum_overflow())?;

    let mut previous: Option<i64> = None;
    let mut passes = 0;
    let mut pass = Pass::default();
    let mut net_refund = 0;

    while passes < MAX_SETTLEMENT_PASSES {
        passes += 1;
        pass = run_pass(&candidate.items, deductible_room, min_tax_amount, context, tables)?;

        let applied = pass.applied_total().ok_or_else(|| context.sum_overflow())?;
        net_refund = truncate_amount(applied - pass.surtax_total);

        if previous.is_some_and(|prev| (net_refund - prev).abs() <= CONVERGENCE_TOLERANCE) {
            break;
        }
        previous = Some(net_refund);
    }

    let applied = pass.applied_total().ok_or_else(|| context.sum_overflow())?;
    let totals = SettlementTotals {
        exemption_total: truncate_amount(pass.exemption_total),
        credit_total: truncate_amount(pass.credit_total),
        min_tax_adjustment: truncate_amount(gross_total - applied),
        surtax_total: truncate_amount(pass.surtax_total),
        carryforward_total: pass.carryforward_total,
        net_refund,
    };

    debug!(
        claim_id = %context.claim_id,
        sequence = candidate.sequence,
        passes,
        net_refund,
        min_tax_adjustment = totals.min_tax_adjustment,
        surtax_total = totals.surtax_total,
        "Settled candidate"
    );

    let audit_step = settlement_audit_step(
        &candidate,
        &rate,
        min_tax_amount,
        deductible_room,
        &pass,
        &totals,
        passes,
        step_number,
    );

    let settlement = Settlement {
        totals,
        min_tax_amount,
        deductible_room,
        rd_room_released: pass.rd_room_released,
        application_order: pass.application_order,
        carryforwards: pass.carryforwards,
        passes,
    };

    Ok(SettlementResult {
        settled: SettledCandidate {
            candidate,
            settlement,
        },
        audit_step,
    })
}

/// Applies every item once in statutory order.
fn run_pass(
    items: &[EligibleItem],
    deductible_room: i64,
    min_tax_amount: i64,
    context: &SettlementContext,
    tables: &ReferenceTables,
) -> EngineResult<Pass> {
    let mut pass = Pass::default();
    let mut remaining = deductible_room;

    for stage in [
        ApplicationStage::Exemption,
        ApplicationStage::NonCarryforwardCredit,
    ] {
        for item in items.iter().filter(|item| ApplicationStage::of(item) == stage) {
            apply_item(item, stage, &mut remaining, &mut pass, context, tables)?;
        }
    }

    let allowance = rd_room_allowance(items, context.entity_size, min_tax_amount, tables)
        .map_err(|e| context.overflow(e))?;
    pass.rd_room_released = allowance.released;
    remaining = remaining
        .checked_add(allowance.released)
        .ok_or_else(|| context.sum_overflow())?;

    for item in items
        .iter()
        .filter(|item| ApplicationStage::of(item) == ApplicationStage::CarryforwardCredit)
    {
        apply_item(
            item,
            ApplicationStage::CarryforwardCredit,
            &mut remaining,
            &mut pass,
            context,
            tables,
        )?;
    }

    Ok(pass)
}

fn apply_item(
    item: &EligibleItem,
    stage: ApplicationStage,
    remaining: &mut i64,
    pass: &mut Pass,
    context: &SettlementContext,
    tables: &ReferenceTables,
) -> EngineResult<()> {
    let gross = item.gross_amount;
    let applied = gross.min(*remaining).max(0);
    let excess = gross - applied;
    *remaining -= applied;

    let surtax = calculate_surtax(item, applied, tables).map_err(|e| context.overflow(e))?;

    let (expired, carried) = match stage {
        ApplicationStage::CarryforwardCredit => (0, excess),
        ApplicationStage::Exemption | ApplicationStage::NonCarryforwardCredit => (excess, 0),
    };

    let total = match stage {
        ApplicationStage::Exemption => &mut pass.exemption_total,
        ApplicationStage::NonCarryforwardCredit | ApplicationStage::CarryforwardCredit => {
            &mut pass.credit_total
        }
    };
    *total = total
        .checked_add(applied)
        .ok_or_else(|| context.sum_overflow())?;
    pass.surtax_total = pass
        .surtax_total
        .checked_add(surtax)
        .ok_or_else(|| context.sum_overflow())?;

    if carried > 0 {
        pass.carryforward_total = pass
            .carryforward_total
            .checked_add(carried)
            .ok_or_else(|| context.sum_overflow())?;
        pass.carryforwards.push(CarryforwardEntry {
            item_id: item.item_id.clone(),
            provision: item.provision.clone(),
            amount: carried,
            max_years: CARRYFORWARD_MAX_YEARS,
        });
    }

    pass.application_order.push(ApplicationEntry {
        item_id: item.item_id.clone(),
        provision: item.provision.clone(),
        stage,
        gross_amount: gross,
        applied_amount: applied,
        expired_amount: expired,
        carryforward_amount: carried,
        surtax_amount: surtax,
    });

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn settlement_audit_step(
    candidate: &Candidate,
    rate: &MinTaxRate,
    min_tax_amount: i64,
    deductible_room: i64,
    pass: &Pass,
    totals: &SettlementTotals,
    passes: u32,
    step_number: u32,
) -> AuditStep {
    let rate_note = if rate.defaulted { " (default)" } else { "" };

    AuditStep {
        step_number,
        rule_id: SETTLEMENT_RULE_ID.to_string(),
        rule_name: "Minimum-Tax Settlement".to_string(),
        legal_ref: SETTLEMENT_LEGAL_REF.to_string(),
        input: serde_json::json!({
            "sequence": candidate.sequence,
            "items": candidate.item_ids(),
            "min_tax_percent": rate.percent.normalize().to_string(),
            "min_tax_rate_defaulted": rate.defaulted
        }),
        output: serde_json::json!({
            "min_tax_amount": min_tax_amount,
            "deductible_room": deductible_room,
            "rd_room_released": pass.rd_room_released,
            "totals": totals,
            "application_order": &pass.application_order,
            "passes": passes
        }),
        reasoning: format!(
            "Minimum tax {}% {}= {}, room {} (+{} R&D); applied {} exemption + {} credit, surtax {}, net refund {} after {} pass(es)",
            rate.percent.normalize(),
            rate_note,
            min_tax_amount,
            deductible_room,
            pass.rd_room_released,
            totals.exemption_total,
            totals.credit_total,
            totals.surtax_total,
            totals.net_refund,
            passes
        ),
    }
}
