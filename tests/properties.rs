//! Property tests for the search and settlement stages.
//!
//! Random item sets are drawn from a small pool of provisions so that
//! exclusion pairs are hit often.

use proptest::prelude::*;

use refund_combination_engine::calculation::{
    AMOUNT_UNIT, Deadline, ExclusionPair, MAX_SETTLEMENT_PASSES, SettlementContext,
    enumerate_combinations, rank_candidates, settle_candidate, truncate_amount, violates_any,
};
use refund_combination_engine::config::ReferenceTables;
use refund_combination_engine::models::{
    Candidate, CombinationGroup, EligibleItem, EntitySize, ItemKind, RdTier,
};

const PROVISIONS: [&str; 5] = ["P-A", "P-B", "P-C", "P-D", "P-E"];

fn arb_item() -> impl Strategy<Value = (usize, bool, i64, bool, bool)> {
    (0..PROVISIONS.len(), any::<bool>(), 0i64..1_000_000, any::<bool>(), any::<bool>())
}

fn build_items(specs: &[(usize, bool, i64, bool, bool)]) -> Vec<EligibleItem> {
    specs
        .iter()
        .enumerate()
        .map(|(i, &(provision, exemption, amount, carryforward, rd))| {
            let kind = if exemption {
                ItemKind::Exemption
            } else {
                ItemKind::Credit
            };
            let mut item = EligibleItem::new(format!("I{:02}", i), PROVISIONS[provision], kind, amount);
            if carryforward {
                item = item.with_carryforward();
            }
            if rd {
                item = item.with_rd_tier(RdTier::GeneralSme);
            }
            item
        })
        .collect()
}

fn build_pairs(specs: &[(usize, usize)]) -> Vec<ExclusionPair> {
    specs
        .iter()
        .filter(|(a, b)| a != b)
        .enumerate()
        .map(|(i, &(a, b))| ExclusionPair {
            rule_id: i as u32 + 1,
            provision_a: PROVISIONS[a].to_string(),
            provision_b: PROVISIONS[b].to_string(),
            condition_note: String::new(),
            legal_basis: String::new(),
        })
        .collect()
}

fn split(items: Vec<EligibleItem>, pairs: &[ExclusionPair]) -> (Vec<EligibleItem>, Vec<EligibleItem>) {
    items
        .into_iter()
        .partition(|item| !pairs.iter().any(|pair| pair.involves(&item.provision)))
}

fn context(entity_size: EntitySize, computed_tax: i64) -> SettlementContext {
    SettlementContext {
        claim_id: "REQ-PROP".to_string(),
        tax_base: computed_tax * 5,
        computed_tax,
        entity_size,
    }
}

proptest! {
    #[test]
    fn truncation_moves_toward_zero(amount in -1_000_000_000i64..1_000_000_000) {
        let truncated = truncate_amount(amount);
        prop_assert_eq!(truncated % AMOUNT_UNIT, 0);
        prop_assert!(truncated.abs() <= amount.abs());
        prop_assert!((amount - truncated).abs() < AMOUNT_UNIT);
        prop_assert!(truncated.signum() * amount.signum() >= 0);
    }

    #[test]
    fn no_candidate_violates_a_pair(
        item_specs in prop::collection::vec(arb_item(), 0..10),
        pair_specs in prop::collection::vec((0..PROVISIONS.len(), 0..PROVISIONS.len()), 0..4),
        threshold in 0usize..12,
    ) {
        let pairs = build_pairs(&pair_specs);
        let (independent, involved) = split(build_items(&item_specs), &pairs);

        let result = enumerate_combinations(
            &independent,
            &involved,
            &pairs,
            threshold,
            Deadline::never(),
            2,
        );

        prop_assert!(!result.candidates.is_empty());
        for candidate in &result.candidates {
            prop_assert!(!violates_any(&candidate.items, &pairs));
            for item in &independent {
                prop_assert!(candidate.items.contains(item));
            }
        }
    }

    #[test]
    fn settlement_stays_within_refund_ceiling(
        item_specs in prop::collection::vec(arb_item(), 0..8),
        computed_tax in 0i64..5_000_000,
        sme in any::<bool>(),
    ) {
        let entity_size = if sme { EntitySize::Sme } else { EntitySize::Large };
        let candidate = Candidate::new(1, build_items(&item_specs));
        let gross_total = candidate.gross_total();

        let result = settle_candidate(
            candidate,
            &context(entity_size, computed_tax),
            &ReferenceTables::default(),
            4,
        )
        .unwrap();
        let settlement = &result.settled.settlement;
        let totals = &settlement.totals;

        prop_assert!(settlement.passes >= 1);
        prop_assert!(settlement.passes <= MAX_SETTLEMENT_PASSES);
        prop_assert!(settlement.rd_room_released <= settlement.min_tax_amount);
        prop_assert!(totals.net_refund >= 0);
        prop_assert_eq!(totals.net_refund % AMOUNT_UNIT, 0);
        prop_assert!(
            totals.exemption_total + totals.credit_total
                <= settlement.deductible_room + settlement.rd_room_released
        );
        prop_assert!(totals.net_refund <= totals.exemption_total + totals.credit_total);
        prop_assert!(totals.exemption_total + totals.credit_total <= gross_total);
    }

    #[test]
    fn ranking_orders_by_net_refund(
        item_specs in prop::collection::vec(arb_item(), 1..8),
        pair_specs in prop::collection::vec((0..PROVISIONS.len(), 0..PROVISIONS.len()), 1..4),
        computed_tax in 1i64..5_000_000,
    ) {
        let pairs = build_pairs(&pair_specs);
        let (independent, involved) = split(build_items(&item_specs), &pairs);
        let enumeration = enumerate_combinations(
            &independent,
            &involved,
            &pairs,
            15,
            Deadline::never(),
            2,
        );

        let settled: Vec<_> = enumeration
            .candidates
            .into_iter()
            .map(|candidate| {
                settle_candidate(
                    candidate,
                    &context(EntitySize::Large, computed_tax),
                    &ReferenceTables::default(),
                    3,
                )
                .unwrap()
                .settled
            })
            .collect();
        let count = settled.len();

        let ranking = rank_candidates(settled, &pairs, 4);

        prop_assert_eq!(ranking.combinations.len(), count);
        prop_assert_eq!(ranking.combinations[0].group, CombinationGroup::Optimal);
        for window in ranking.combinations.windows(2) {
            prop_assert!(window[0].totals.net_refund >= window[1].totals.net_refund);
            prop_assert_eq!(window[1].group, CombinationGroup::Alternative);
        }
        prop_assert_eq!(ranking.verifications.len(), pairs.len());
        prop_assert!(ranking.verifications.iter().all(|v| !v.violation_detected));
    }
}
