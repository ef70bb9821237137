//! Ranking of settled candidates and assembly of the audit records.

use tracing::debug;

use crate::models::{
    AuditStep, CombinationGroup, ExclusionVerification, RankedCombination, SettledCandidate,
    SettlementTotals,
};

use super::exclusion::ExclusionPair;

/// Rule identifier recorded in the audit trace.
pub const RANKING_RULE_ID: &str = "combination_ranking";

/// Formats the combination identifier of a rank.
pub fn combo_id(rank: usize) -> String {
    format!("COMBO-{:03}", rank)
}

/// Formats the identifier of an exclusion-verification record.
pub fn verify_id(sequence: usize) -> String {
    format!("EXCL-{:03}", sequence)
}

/// The result of ranking settled candidates.
#[derive(Debug, Clone)]
pub struct RankingResult {
    /// Combinations by rank, best first.
    pub combinations: Vec<RankedCombination>,
    /// One verification record per effective exclusion pair.
    pub verifications: Vec<ExclusionVerification>,
    /// The audit step recording this ranking.
    pub audit_step: AuditStep,
}

/// Ranks settled candidates by descending net refund.
///
/// The sort is stable, so candidates with equal net refund keep their
/// discovery order. Rank 1 is the optimal combination and every other
/// combination is an alternative. Each effective exclusion pair produces a
/// verification record against the optimal combination, flagged if any
/// ranked combination holds both of its provisions.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::rank_candidates;
/// use refund_combination_engine::models::{Candidate, CombinationGroup, SettledCandidate, Settlement};
///
/// let mut low = Settlement::default();
/// low.totals.net_refund = 100;
/// let mut high = Settlement::default();
/// high.totals.net_refund = 800;
///
/// let settled = vec![
///     SettledCandidate { candidate: Candidate::new(1, vec![]), settlement: low },
///     SettledCandidate { candidate: Candidate::new(2, vec![]), settlement: high },
/// ];
/// let result = rank_candidates(settled, &[], 5);
///
/// assert_eq!(result.combinations[0].combo_id, "COMBO-001");
/// assert_eq!(result.combinations[0].totals.net_refund, 800);
/// assert_eq!(result.combinations[1].group, CombinationGroup::Alternative);
/// ```
pub fn rank_candidates(
    mut settled: Vec<SettledCandidate>,
    pairs: &[ExclusionPair],
    step_number: u32,
) -> RankingResult {
    settled.sort_by_key(|candidate| std::cmp::Reverse(candidate.net_refund()));

    let verifications = pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| ExclusionVerification {
            verify_id: verify_id(i + 1),
            combo_id: combo_id(1),
            provision_a: pair.provision_a.clone(),
            provision_b: pair.provision_b.clone(),
            overlap_allowed: false,
            condition_note: pair.condition_note.clone(),
            violation_detected: settled
                .iter()
                .any(|s| pair.is_violated_by(&s.candidate.items)),
            legal_basis: pair.legal_basis.clone(),
        })
        .collect::<Vec<_>>();

    let order: Vec<usize> = settled.iter().map(|s| s.candidate.sequence).collect();

    let combinations: Vec<RankedCombination> = settled
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let rank = i + 1;
            RankedCombination {
                combo_id: combo_id(rank),
                rank,
                group: if rank == 1 {
                    CombinationGroup::Optimal
                } else {
                    CombinationGroup::Alternative
                },
                name: format!("Combination-{} ({} items)", rank, s.candidate.items.len()),
                item_ids: s.candidate.item_ids(),
                totals: s.settlement.totals,
                application_order: s.settlement.application_order,
                carryforwards: s.settlement.carryforwards,
                passes: s.settlement.passes,
            }
        })
        .collect();

    let best = combinations.first().map_or(0, |c| c.totals.net_refund);
    debug!(
        candidates = combinations.len(),
        best_net_refund = best,
        "Ranked candidates"
    );

    let audit_step = AuditStep {
        step_number,
        rule_id: RANKING_RULE_ID.to_string(),
        rule_name: "Combination Ranking".to_string(),
        legal_ref: String::new(),
        input: serde_json::json!({
            "candidates": combinations.len(),
            "pairs": pairs.len()
        }),
        output: serde_json::json!({
            "sequence_by_rank": order,
            "best_net_refund": best,
            "violations": verifications.iter().filter(|v| v.violation_detected).count()
        }),
        reasoning: format!(
            "{} candidate(s) ranked by net refund; optimal nets {}",
            combinations.len(),
            best
        ),
    };

    RankingResult {
        combinations,
        verifications,
        audit_step,
    }
}

/// The single placeholder result of a claim with no eligible items.
pub fn empty_combination() -> RankedCombination {
    RankedCombination {
        combo_id: combo_id(1),
        rank: 1,
        group: CombinationGroup::Empty,
        name: "No applicable items".to_string(),
        item_ids: vec![],
        totals: SettlementTotals::default(),
        application_order: vec![],
        carryforwards: vec![],
        passes: 0,
    }
}
