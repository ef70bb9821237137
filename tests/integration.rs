//! Integration tests for the refund combination engine.
//!
//! This test suite runs the full search against the reference tables in
//! `config/reference` and the in-memory collaborators:
//! - Empty claims
//! - Exclusion pairs and independent items
//! - Greedy fallback
//! - Minimum-tax room and the R&D allowance
//! - Idempotent re-runs
//! - Error cases

use std::sync::Arc;
use std::time::Duration;

use refund_combination_engine::config::{ConfigLoader, ReferenceTables, SearchSettings, SystemParams};
use refund_combination_engine::engine::{
    ClaimRecords, CombinationEngine, InMemoryClaimSource, InMemoryResultStore, ResultStore,
};
use refund_combination_engine::error::{CalculationStep, EngineError};
use refund_combination_engine::models::{
    ApplicationStage, ClaimBasic, CombinationGroup, CombinationReport, EligibleItem, EntitySize,
    ItemKind, RdTier, SearchStrategy, TaxType,
};

// =============================================================================
// Test Helpers
// =============================================================================

type TestEngine = CombinationEngine<InMemoryClaimSource, InMemoryResultStore>;

const CLAIM_ID: &str = "REQ-2024-0001";

fn create_engine(basic: ClaimBasic, items: Vec<EligibleItem>) -> TestEngine {
    let loader = ConfigLoader::load("./config/reference").expect("Failed to load config");
    let source = InMemoryClaimSource::new();
    source
        .insert(basic.claim_id.clone(), ClaimRecords::new(basic, items))
        .unwrap();
    CombinationEngine::new(
        Arc::new(loader.tables().clone()),
        source,
        InMemoryResultStore::new(),
    )
}

/// Large corporate claim: 10% minimum tax on a computed tax of 5,000.
fn large_claim() -> ClaimBasic {
    ClaimBasic {
        claim_id: CLAIM_ID.to_string(),
        tax_type: TaxType::Corporate,
        entity_size: EntitySize::Large,
        tax_year: 2024,
        taxable_income: 25_000,
        computed_tax: 5_000,
    }
}

fn sme_claim(computed_tax: i64) -> ClaimBasic {
    ClaimBasic {
        claim_id: CLAIM_ID.to_string(),
        tax_type: TaxType::Corporate,
        entity_size: EntitySize::Sme,
        tax_year: 2024,
        taxable_income: computed_tax * 10,
        computed_tax,
    }
}

fn item_a() -> EligibleItem {
    EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000)
}

fn item_b() -> EligibleItem {
    EligibleItem::new("B", "ART-24", ItemKind::Credit, 800)
}

fn item_c() -> EligibleItem {
    EligibleItem::new("C", "ART-25-6", ItemKind::Credit, 300)
}

fn net_refunds(report: &CombinationReport) -> Vec<i64> {
    report
        .combinations
        .iter()
        .map(|c| c.totals.net_refund)
        .collect()
}

fn item_sets(report: &CombinationReport) -> Vec<Vec<String>> {
    report
        .combinations
        .iter()
        .map(|c| c.item_ids.clone())
        .collect()
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// SECTION 1: Empty Claims
// =============================================================================

#[test]
fn test_empty_claim_yields_single_empty_result() {
    let engine = create_engine(large_claim(), vec![]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.strategy, SearchStrategy::Empty);
    assert_eq!(report.combinations.len(), 1);
    let only = &report.combinations[0];
    assert_eq!(only.group, CombinationGroup::Empty);
    assert_eq!(only.rank, 1);
    assert_eq!(only.totals.net_refund, 0);
    assert!(report.verifications.is_empty());
    assert!(report
        .audit_trace
        .warnings
        .iter()
        .any(|w| w.code == "NO_APPLICABLE_ITEMS"));

    let stored = engine.store().combinations(CLAIM_ID).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].group, CombinationGroup::Empty);
}

// =============================================================================
// SECTION 2: Exclusion Pairs
// =============================================================================

#[test]
fn test_simple_exclusion_pair() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b()]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(
        report.strategy,
        SearchStrategy::Exact {
            deadline_exceeded: false
        }
    );
    assert_eq!(item_sets(&report), vec![ids(&["A"]), ids(&["B"]), ids(&[])]);
    assert_eq!(net_refunds(&report), vec![800, 640, 0]);

    let optimal = report.optimal().unwrap();
    assert_eq!(optimal.combo_id, "COMBO-001");
    assert_eq!(optimal.group, CombinationGroup::Optimal);
    assert_eq!(optimal.totals.exemption_total, 1_000);
    assert_eq!(optimal.totals.surtax_total, 200);
    assert_eq!(report.combinations[1].group, CombinationGroup::Alternative);
    assert_eq!(report.combinations[1].totals.credit_total, 800);
    assert_eq!(report.combinations[1].totals.surtax_total, 160);
    assert_eq!(report.combinations[2].combo_id, "COMBO-003");
}

#[test]
fn test_pair_is_never_applied_together() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b(), item_c()]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    for combination in &report.combinations {
        let has_a = combination.item_ids.contains(&"A".to_string());
        let has_b = combination.item_ids.contains(&"B".to_string());
        assert!(!(has_a && has_b), "{} applies both", combination.combo_id);
    }
}

#[test]
fn test_verification_record_per_effective_pair() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b()]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.verifications.len(), 1);
    let record = &report.verifications[0];
    assert_eq!(record.verify_id, "EXCL-001");
    assert_eq!(record.combo_id, "COMBO-001");
    assert_eq!(record.provision_a, "ART-63");
    assert_eq!(record.provision_b, "ART-24");
    assert!(!record.overlap_allowed);
    assert!(!record.violation_detected);
    assert!(record.legal_basis.contains("127(4)"));

    assert_eq!(engine.store().verifications(CLAIM_ID).unwrap().len(), 1);
}

#[test]
fn test_independent_item_joins_every_candidate() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b(), item_c()]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(
        item_sets(&report),
        vec![ids(&["C", "A"]), ids(&["C", "B"]), ids(&["C"])]
    );
    // {A, C}: 1,300 applied - 260 surtax; {B, C}: 1,100 - 220; {C}: 300 - 60
    assert_eq!(net_refunds(&report), vec![1_040, 880, 240]);
}

#[test]
fn test_expired_rule_does_not_exclude() {
    let items = vec![
        EligibleItem::new("E1", "ART-29-7", ItemKind::Credit, 400),
        EligibleItem::new("E2", "ART-30-4", ItemKind::Credit, 600),
    ];
    let engine = create_engine(large_claim(), items);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.combinations.len(), 1);
    assert_eq!(report.combinations[0].item_ids, ids(&["E1", "E2"]));
    assert!(report.verifications.is_empty());
}

#[test]
fn test_allowed_rule_does_not_exclude() {
    let items = vec![
        EligibleItem::new("R", "ART-10", ItemKind::Credit, 400),
        item_b(),
    ];
    let engine = create_engine(large_claim(), items);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.combinations.len(), 1);
    assert_eq!(report.combinations[0].item_ids, ids(&["R", "B"]));
}

// =============================================================================
// SECTION 3: Greedy Fallback
// =============================================================================

#[test]
fn test_greedy_fallback_above_threshold() {
    let items: Vec<EligibleItem> = (0..16)
        .map(|i| {
            if i % 2 == 0 {
                EligibleItem::new(format!("X{:02}", i), "ART-63", ItemKind::Exemption, 100 + i)
            } else {
                EligibleItem::new(format!("X{:02}", i), "ART-24", ItemKind::Credit, 100 + i)
            }
        })
        .collect();
    let mut basic = large_claim();
    basic.computed_tax = 1_000_000;
    let engine = create_engine(basic, items);

    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.strategy, SearchStrategy::Greedy);
    assert_eq!(report.combinations.len(), 1);
    let chosen = &report.combinations[0];
    assert_eq!(chosen.group, CombinationGroup::Optimal);
    // X15 (ART-24) is the largest, so every ART-24 credit is chosen.
    assert_eq!(chosen.item_ids.len(), 8);
    assert_eq!(chosen.item_ids[0], "X15");
    assert!(report.verifications.iter().all(|v| !v.violation_detected));
    assert!(report
        .audit_trace
        .warnings
        .iter()
        .any(|w| w.code == "GREEDY_FALLBACK"));
}

#[test]
fn test_threshold_setting_switches_strategy() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b()]).with_settings(
        SearchSettings {
            greedy_threshold: 1,
            search_timeout: Duration::from_secs(120),
        },
    );
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.strategy, SearchStrategy::Greedy);
    assert_eq!(item_sets(&report), vec![ids(&["A"])]);
}

// =============================================================================
// SECTION 4: Deadline
// =============================================================================

#[test]
fn test_deadline_overrun_returns_partial_result() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b(), item_c()]).with_settings(
        SearchSettings {
            greedy_threshold: 15,
            search_timeout: Duration::ZERO,
        },
    );
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(
        report.strategy,
        SearchStrategy::Exact {
            deadline_exceeded: true
        }
    );
    assert_eq!(item_sets(&report), vec![ids(&["C"])]);
    assert_eq!(report.combinations[0].group, CombinationGroup::Optimal);
}

// =============================================================================
// SECTION 5: Minimum Tax and R&D Allowance
// =============================================================================

#[test]
fn test_minimum_tax_caps_applied_amount() {
    // SME at 7%: minimum tax 140, room 1,860.
    let items = vec![
        EligibleItem::new("E", "ART-7", ItemKind::Exemption, 1_500),
        EligibleItem::new("K", "ART-24", ItemKind::Credit, 1_000).with_carryforward(),
    ];
    let engine = create_engine(sme_claim(2_000), items);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    // ART-7 and ART-24 are an exclusion pair: {E}, {K}, {}.
    let best = report.optimal().unwrap();
    assert_eq!(best.item_ids, ids(&["E"]));
    assert_eq!(best.totals.exemption_total, 1_500);
    assert_eq!(best.totals.surtax_total, 0);
    assert_eq!(best.totals.net_refund, 1_500);

    let credit_only = &report.combinations[1];
    assert_eq!(credit_only.item_ids, ids(&["K"]));
    assert_eq!(credit_only.totals.credit_total, 1_000);
    assert_eq!(credit_only.totals.net_refund, 800);
}

#[test]
fn test_rd_allowance_releases_room_for_carryforward_credit() {
    // SME at 7%: minimum tax 700, room 9,300.
    let items = vec![
        EligibleItem::new("E", "ART-7", ItemKind::Exemption, 6_000),
        EligibleItem::new("R", "ART-10", ItemKind::Credit, 5_000)
            .with_carryforward()
            .with_rd_tier(RdTier::GeneralSme),
    ];
    let engine = create_engine(sme_claim(10_000), items);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(report.combinations.len(), 1);
    let best = report.optimal().unwrap();
    // 50% of 5,000 is released, capped at the 700 minimum tax.
    assert_eq!(best.totals.exemption_total, 6_000);
    assert_eq!(best.totals.credit_total, 4_000);
    assert_eq!(best.totals.carryforward_total, 1_000);
    assert_eq!(best.totals.min_tax_adjustment, 1_000);
    assert_eq!(best.totals.net_refund, 10_000);

    assert_eq!(best.carryforwards.len(), 1);
    assert_eq!(best.carryforwards[0].item_id, "R");
    assert_eq!(best.carryforwards[0].max_years, 10);

    let stages: Vec<ApplicationStage> = best.application_order.iter().map(|e| e.stage).collect();
    assert_eq!(
        stages,
        vec![ApplicationStage::Exemption, ApplicationStage::CarryforwardCredit]
    );
    assert!(best.passes >= 1 && best.passes <= 5);
}

#[test]
fn test_individual_claim_uses_computed_tax_as_base() {
    let mut basic = large_claim();
    basic.tax_type = TaxType::Individual;
    basic.taxable_income = 500_000_000_000;
    let engine = create_engine(basic, vec![item_a()]);
    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    // Bracket looked up by computed tax 5,000 gives 10%, not the 17% of the income.
    let best = report.optimal().unwrap();
    assert_eq!(best.totals.net_refund, 800);
}

#[test]
fn test_unparsable_threshold_falls_back_to_default() {
    let loader = ConfigLoader::load("./config/reference").unwrap();
    let reference = loader.tables();
    let mut params = SystemParams::default();
    params
        .params
        .insert("greedy_fallback_threshold".to_string(), "fifteen".to_string());
    let tables = ReferenceTables::new(
        reference.exclusion_rules().to_vec(),
        reference.min_tax_brackets().to_vec(),
        vec![],
        vec![],
        Some(params),
    );
    let source = InMemoryClaimSource::new();
    source
        .insert(CLAIM_ID, ClaimRecords::new(large_claim(), vec![item_a(), item_b()]))
        .unwrap();
    let engine = CombinationEngine::new(Arc::new(tables), source, InMemoryResultStore::new());

    let report = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(
        report.strategy,
        SearchStrategy::Exact {
            deadline_exceeded: false
        }
    );
    assert!(report
        .audit_trace
        .warnings
        .iter()
        .any(|w| w.code == "PARAM_FALLBACK"));
    assert_eq!(net_refunds(&report), vec![800, 640, 0]);
}

// =============================================================================
// SECTION 6: Idempotence
// =============================================================================

#[test]
fn test_rerun_replaces_prior_results() {
    let engine = create_engine(large_claim(), vec![item_a(), item_b(), item_c()]);

    let first = engine.find_optimal_combination(CLAIM_ID).unwrap();
    let second = engine.find_optimal_combination(CLAIM_ID).unwrap();

    assert_eq!(first.combinations, second.combinations);
    assert_eq!(first.verifications, second.verifications);
    assert_ne!(first.calculation_id, second.calculation_id);

    assert_eq!(engine.store().combinations(CLAIM_ID).unwrap(), second.combinations);
    assert_eq!(engine.store().verifications(CLAIM_ID).unwrap().len(), 1);
}

// =============================================================================
// SECTION 7: Error Cases
// =============================================================================

#[test]
fn test_missing_financial_record_is_fatal() {
    let loader = ConfigLoader::load("./config/reference").unwrap();
    let source = InMemoryClaimSource::new();
    let mut records = ClaimRecords::new(large_claim(), vec![item_a()]);
    records.financial = None;
    source.insert(CLAIM_ID, records).unwrap();
    let store = InMemoryResultStore::new();
    let engine = CombinationEngine::new(Arc::new(loader.tables().clone()), source, store);

    let err = engine.find_optimal_combination(CLAIM_ID).unwrap_err();
    match &err {
        EngineError::MissingRecord { record, step, .. } => {
            assert_eq!(record, "financial_info");
            assert_eq!(*step, CalculationStep::LoadInputs);
        }
        other => panic!("Expected MissingRecord, got {:?}", other),
    }
    assert!(err.to_string().contains(CLAIM_ID));
    assert!(engine.store().combinations(CLAIM_ID).unwrap().is_empty());
}

#[test]
fn test_unknown_claim_is_fatal() {
    let engine = create_engine(large_claim(), vec![]);
    let err = engine.find_optimal_combination("REQ-UNKNOWN").unwrap_err();
    assert_eq!(err.step(), Some(CalculationStep::LoadInputs));
}
