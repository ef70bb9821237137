//! The combination search entry point.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{
    Deadline, SettlementContext, empty_combination, enumerate_combinations, rank_candidates,
    resolve_exclusions, resolve_min_tax_rate, settle_candidate,
};
use crate::config::{ReferenceTables, SearchSettings};
use crate::error::{CalculationStep, EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditTrace, AuditWarning, CombinationReport, EligibleItem, ExclusionVerification,
    RankedCombination, SearchStrategy,
};

use super::sources::{ClaimSource, SourceError};
use super::store::{ResultStore, StoreError};

/// Finds the combination of credits and exemptions with the highest net
/// refund for a claim.
///
/// The engine holds read-only reference tables, shared across claims, and
/// the collaborators that provide claim records and persist results. One
/// call processes one claim synchronously; concurrent calls for different
/// claims share nothing mutable.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use refund_combination_engine::config::ReferenceTables;
/// use refund_combination_engine::engine::{
///     ClaimRecords, CombinationEngine, InMemoryClaimSource, InMemoryResultStore,
/// };
/// use refund_combination_engine::models::{
///     ClaimBasic, CombinationGroup, EligibleItem, EntitySize, ItemKind, TaxType,
/// };
///
/// let source = InMemoryClaimSource::new();
/// let basic = ClaimBasic {
///     claim_id: "REQ-001".to_string(),
///     tax_type: TaxType::Corporate,
///     entity_size: EntitySize::Large,
///     tax_year: 2024,
///     taxable_income: 25_000,
///     computed_tax: 5_000,
/// };
/// let items = vec![EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000)];
/// source.insert("REQ-001", ClaimRecords::new(basic, items))?;
///
/// let engine = CombinationEngine::new(
///     Arc::new(ReferenceTables::default()),
///     source,
///     InMemoryResultStore::new(),
/// );
/// let report = engine.find_optimal_combination("REQ-001")?;
///
/// let best = report.optimal().unwrap();
/// assert_eq!(best.group, CombinationGroup::Optimal);
/// assert_eq!(best.totals.net_refund, 800);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CombinationEngine<S, R> {
    tables: Arc<ReferenceTables>,
    source: S,
    store: R,
    settings: Option<SearchSettings>,
}

impl<S: ClaimSource, R: ResultStore> CombinationEngine<S, R> {
    /// Creates an engine that reads its search settings from the tables'
    /// system parameters.
    pub fn new(tables: Arc<ReferenceTables>, source: S, store: R) -> Self {
        Self {
            tables,
            source,
            store,
            settings: None,
        }
    }

    /// Uses fixed search settings instead of the system parameters.
    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Swaps in freshly loaded reference tables for subsequent runs.
    pub fn replace_tables(&mut self, tables: Arc<ReferenceTables>) {
        self.tables = tables;
    }

    /// Returns the reference tables in use.
    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Returns the result store.
    pub fn store(&self) -> &R {
        &self.store
    }

    /// Runs the combination search for a claim and persists its results.
    ///
    /// Prior results of the claim are deleted first, so repeating the call
    /// with unchanged inputs replaces rather than accumulates results.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingRecord`] if the basic, financial or
    ///   eligibility record of the claim is missing
    /// - [`EngineError::Calculation`] tagged with the failing step for any
    ///   other failure
    ///
    /// A claim without applicable items is not an error: a single empty
    /// combination is returned.
    pub fn find_optimal_combination(&self, claim_id: &str) -> EngineResult<CombinationReport> {
        let start_time = Instant::now();
        info!(claim_id, "Starting combination search");

        let basic = self
            .source
            .basic(claim_id)
            .map_err(|e| source_error(claim_id, e))?
            .ok_or_else(|| missing(claim_id, "claim_basic"))?;
        self.source
            .financial(claim_id)
            .map_err(|e| source_error(claim_id, e))?
            .ok_or_else(|| missing(claim_id, "financial_info"))?;
        self.source
            .eligibility(claim_id)
            .map_err(|e| source_error(claim_id, e))?
            .ok_or_else(|| missing(claim_id, "eligibility_diagnosis"))?;

        let items: Vec<EligibleItem> = self
            .source
            .eligible_items(claim_id)
            .map_err(|e| source_error(claim_id, e))?
            .into_iter()
            .filter(EligibleItem::is_applicable)
            .collect();
        if let Some(item) = items.iter().find(|item| item.gross_amount < 0) {
            return Err(EngineError::calculation(
                claim_id,
                CalculationStep::LoadInputs,
                format!(
                    "item '{}' has negative gross amount {}",
                    item.item_id, item.gross_amount
                ),
            ));
        }

        self.store
            .delete_claim(claim_id)
            .map_err(|e| store_error(claim_id, e))?;

        let mut trace = AuditTrace::default();

        if items.is_empty() {
            warn!(claim_id, "No applicable items, recording empty combination");
            trace.warnings.push(AuditWarning {
                code: "NO_APPLICABLE_ITEMS".to_string(),
                message: "Claim has no applicable credit or exemption items".to_string(),
                severity: "low".to_string(),
            });

            let combinations = vec![empty_combination()];
            self.store
                .save_combinations(claim_id, &combinations)
                .map_err(|e| store_error(claim_id, e))?;

            trace.duration_us = start_time.elapsed().as_micros() as u64;
            info!(
                claim_id,
                candidates = 1,
                best_net_refund = 0,
                duration_us = trace.duration_us,
                "Combination search complete"
            );
            return Ok(self.report(claim_id, SearchStrategy::Empty, combinations, vec![], trace));
        }

        let (settings, warnings) = match self.settings {
            Some(settings) => (settings, vec![]),
            None => SearchSettings::from_params(self.tables.system_params()),
        };
        trace.warnings.extend(warnings);
        let deadline = Deadline::after(settings.search_timeout);

        // Step 1: exclusion resolution
        let resolution =
            resolve_exclusions(&items, self.tables.exclusion_rules(), basic.tax_year, 1);
        trace.steps.push(resolution.audit_step);

        // Step 2: enumeration
        let enumeration = enumerate_combinations(
            &resolution.independent,
            &resolution.involved,
            &resolution.pairs,
            settings.greedy_threshold,
            deadline,
            2,
        );
        trace.steps.push(enumeration.audit_step);
        match enumeration.strategy {
            SearchStrategy::Greedy => trace.warnings.push(AuditWarning {
                code: "GREEDY_FALLBACK".to_string(),
                message: format!(
                    "{} exclusion-involved items exceed the threshold of {}; greedy result may not be optimal",
                    resolution.involved.len(),
                    settings.greedy_threshold
                ),
                severity: "medium".to_string(),
            }),
            SearchStrategy::Exact {
                deadline_exceeded: true,
            } => trace.warnings.push(AuditWarning {
                code: "SEARCH_DEADLINE_EXCEEDED".to_string(),
                message: format!(
                    "Search stopped after {} of {} subsets; {} candidates kept",
                    enumeration.subsets_examined,
                    1u64 << resolution.involved.len(),
                    enumeration.candidates.len()
                ),
                severity: "medium".to_string(),
            }),
            _ => {}
        }

        // Step 3: settlement
        let context = SettlementContext::from_claim(&basic);
        if resolve_min_tax_rate(&self.tables, context.entity_size, context.tax_base).defaulted {
            trace.warnings.push(AuditWarning {
                code: "MIN_TAX_RATE_DEFAULT".to_string(),
                message: format!(
                    "No minimum-tax bracket for {:?} at base {}; default rate used",
                    context.entity_size, context.tax_base
                ),
                severity: "low".to_string(),
            });
        }

        let mut settled = Vec::with_capacity(enumeration.candidates.len());
        let mut settlement_steps: Vec<AuditStep> = Vec::with_capacity(enumeration.candidates.len());
        for candidate in enumeration.candidates {
            let result = settle_candidate(candidate, &context, &self.tables, 3)?;
            settled.push(result.settled);
            settlement_steps.push(result.audit_step);
        }

        // The stable sort ranks the first candidate with the highest net refund first.
        if let Some(best) = settled
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| Reverse(s.net_refund()))
            .map(|(i, _)| i)
        {
            trace.steps.push(settlement_steps.swap_remove(best));
        }

        // Step 4: ranking
        let ranking = rank_candidates(settled, &resolution.pairs, 4);
        trace.steps.push(ranking.audit_step);

        self.store
            .save_combinations(claim_id, &ranking.combinations)
            .map_err(|e| store_error(claim_id, e))?;
        self.store
            .save_verifications(claim_id, &ranking.verifications)
            .map_err(|e| store_error(claim_id, e))?;

        trace.duration_us = start_time.elapsed().as_micros() as u64;
        info!(
            claim_id,
            candidates = ranking.combinations.len(),
            best_net_refund = ranking
                .combinations
                .first()
                .map_or(0, |c| c.totals.net_refund),
            duration_us = trace.duration_us,
            "Combination search complete"
        );

        Ok(self.report(
            claim_id,
            enumeration.strategy,
            ranking.combinations,
            ranking.verifications,
            trace,
        ))
    }

    fn report(
        &self,
        claim_id: &str,
        strategy: SearchStrategy,
        combinations: Vec<RankedCombination>,
        verifications: Vec<ExclusionVerification>,
        audit_trace: AuditTrace,
    ) -> CombinationReport {
        CombinationReport {
            calculation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            claim_id: claim_id.to_string(),
            strategy,
            combinations,
            verifications,
            audit_trace,
        }
    }
}

fn missing(claim_id: &str, record: &str) -> EngineError {
    EngineError::MissingRecord {
        claim_id: claim_id.to_string(),
        record: record.to_string(),
        step: CalculationStep::LoadInputs,
    }
}

fn source_error(claim_id: &str, err: SourceError) -> EngineError {
    EngineError::calculation(claim_id, CalculationStep::LoadInputs, err.to_string())
}

fn store_error(claim_id: &str, err: StoreError) -> EngineError {
    EngineError::calculation(claim_id, CalculationStep::Persist, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClaimRecords, InMemoryClaimSource, InMemoryResultStore};
    use crate::models::{ClaimBasic, EntitySize, ItemKind, ItemStatus, TaxType};
    use std::time::Duration;

    fn basic(claim_id: &str) -> ClaimBasic {
        ClaimBasic {
            claim_id: claim_id.to_string(),
            tax_type: TaxType::Corporate,
            entity_size: EntitySize::Large,
            tax_year: 2024,
            taxable_income: 25_000,
            computed_tax: 5_000,
        }
    }

    fn engine_with(
        records: ClaimRecords,
    ) -> CombinationEngine<InMemoryClaimSource, InMemoryResultStore> {
        let source = InMemoryClaimSource::new();
        source.insert("REQ-001", records).unwrap();
        CombinationEngine::new(
            Arc::new(ReferenceTables::default()),
            source,
            InMemoryResultStore::new(),
        )
        .with_settings(SearchSettings::default())
    }

    #[test]
    fn test_missing_basic_record_is_fatal() {
        let engine = engine_with(ClaimRecords::default());
        let err = engine.find_optimal_combination("REQ-001").unwrap_err();

        match err {
            EngineError::MissingRecord { record, step, .. } => {
                assert_eq!(record, "claim_basic");
                assert_eq!(step, CalculationStep::LoadInputs);
            }
            other => panic!("Expected MissingRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_eligibility_is_fatal() {
        let mut records = ClaimRecords::new(basic("REQ-001"), vec![]);
        records.eligibility = None;
        let err = engine_with(records)
            .find_optimal_combination("REQ-001")
            .unwrap_err();

        assert!(matches!(err, EngineError::MissingRecord { ref record, .. } if record == "eligibility_diagnosis"));
    }

    #[test]
    fn test_not_applicable_items_are_ignored() {
        let mut rejected = EligibleItem::new("X", "ART-63", ItemKind::Exemption, 1_000);
        rejected.status = ItemStatus::NotApplicable;
        let engine = engine_with(ClaimRecords::new(basic("REQ-001"), vec![rejected]));

        let report = engine.find_optimal_combination("REQ-001").unwrap();
        assert_eq!(report.strategy, SearchStrategy::Empty);
        assert_eq!(report.combinations.len(), 1);
    }

    #[test]
    fn test_negative_gross_amount_is_rejected() {
        let item = EligibleItem::new("N", "ART-63", ItemKind::Exemption, -10);
        let engine = engine_with(ClaimRecords::new(basic("REQ-001"), vec![item]));

        let err = engine.find_optimal_combination("REQ-001").unwrap_err();
        assert_eq!(err.step(), Some(CalculationStep::LoadInputs));
    }

    #[test]
    fn test_trace_records_each_stage() {
        let items = vec![EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000)];
        let engine = engine_with(ClaimRecords::new(basic("REQ-001"), items));

        let report = engine.find_optimal_combination("REQ-001").unwrap();
        let steps: Vec<u32> = report.audit_trace.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(report.engine_version, env!("CARGO_PKG_VERSION"));
        // No bracket in the default tables.
        assert!(report
            .audit_trace
            .warnings
            .iter()
            .any(|w| w.code == "MIN_TAX_RATE_DEFAULT"));
    }

    #[test]
    fn test_zero_timeout_keeps_partial_result() {
        let items = vec![
            EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000),
            EligibleItem::new("B", "ART-24", ItemKind::Credit, 800),
        ];
        let tables = ReferenceTables::new(
            vec![crate::config::ExclusionRule {
                rule_id: 1,
                provision_a: "ART-63".to_string(),
                provision_b: "ART-24".to_string(),
                year_from: 2020,
                year_to: None,
                allowed: false,
                condition_note: String::new(),
                legal_basis: String::new(),
            }],
            vec![],
            vec![],
            vec![],
            None,
        );
        let source = InMemoryClaimSource::new();
        source
            .insert("REQ-001", ClaimRecords::new(basic("REQ-001"), items))
            .unwrap();
        let engine = CombinationEngine::new(Arc::new(tables), source, InMemoryResultStore::new())
            .with_settings(SearchSettings {
                greedy_threshold: 15,
                search_timeout: Duration::ZERO,
            });

        let report = engine.find_optimal_combination("REQ-001").unwrap();
        assert_eq!(
            report.strategy,
            SearchStrategy::Exact {
                deadline_exceeded: true
            }
        );
        assert!(!report.combinations.is_empty());
        assert!(report
            .audit_trace
            .warnings
            .iter()
            .any(|w| w.code == "SEARCH_DEADLINE_EXCEEDED"));
    }
}
