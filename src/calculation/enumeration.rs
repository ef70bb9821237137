//! Candidate combination enumeration.
//!
//! Small exclusion-involved sets are searched exhaustively; larger ones fall
//! back to a single greedy pass. Independent items are part of every
//! candidate either way.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::{AuditStep, Candidate, EligibleItem, SearchStrategy};

use super::exclusion::ExclusionPair;

/// Rule identifier recorded in the audit trace.
pub const ENUMERATION_RULE_ID: &str = "combination_enumeration";

/// Upper bound on the exact search size, whatever threshold is configured.
pub const MAX_EXACT_ITEMS: usize = 30;

/// A cooperative wall-clock deadline, polled by the exact enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
        }
    }

    /// A deadline at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// A deadline that never expires.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// Returns true once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// The result of enumerating candidate combinations.
#[derive(Debug, Clone)]
pub struct EnumerationResult {
    /// Candidates in discovery order. Never empty.
    pub candidates: Vec<Candidate>,
    /// How the candidates were produced.
    pub strategy: SearchStrategy,
    /// Number of subsets examined by the exact search; 0 for greedy.
    pub subsets_examined: u64,
    /// The audit step recording this enumeration.
    pub audit_step: AuditStep,
}

/// Enumerates candidate combinations.
///
/// When the exclusion-involved set has at most `threshold` items (and at most
/// [`MAX_EXACT_ITEMS`]), every subset is examined in ascending bitmask order
/// and each subset that contains no effective pair is unioned with the
/// independent items. The deadline is polled after every subset; once it has
/// passed, the candidates found so far are returned and the strategy is
/// flagged as deadline-exceeded. The empty subset is examined first, so at
/// least one candidate is always produced.
///
/// Above the threshold, a single greedy candidate is built: all items are
/// sorted by descending [`EligibleItem::greedy_key`] (stable on ties) and
/// each item is accepted unless it conflicts with an item already accepted.
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::{Deadline, enumerate_combinations};
/// use refund_combination_engine::models::{EligibleItem, ItemKind, SearchStrategy};
///
/// let independent = vec![EligibleItem::new("C", "ART-25-6", ItemKind::Credit, 300)];
/// let result = enumerate_combinations(&independent, &[], &[], 15, Deadline::never(), 2);
///
/// assert_eq!(result.candidates.len(), 1);
/// assert_eq!(result.strategy, SearchStrategy::Exact { deadline_exceeded: false });
/// ```
pub fn enumerate_combinations(
    independent: &[EligibleItem],
    involved: &[EligibleItem],
    pairs: &[ExclusionPair],
    threshold: usize,
    deadline: Deadline,
    step_number: u32,
) -> EnumerationResult {
    let exact_limit = threshold.min(MAX_EXACT_ITEMS);
    if threshold > MAX_EXACT_ITEMS && involved.len() > MAX_EXACT_ITEMS {
        warn!(
            threshold,
            limit = MAX_EXACT_ITEMS,
            "Configured threshold exceeds the exact search limit"
        );
    }

    let (candidates, strategy, subsets_examined) = if involved.len() <= exact_limit {
        exact_search(independent, involved, pairs, deadline)
    } else {
        warn!(
            involved = involved.len(),
            threshold = exact_limit,
            "Exclusion-involved items exceed threshold, using greedy selection"
        );
        (greedy_search(independent, involved, pairs), SearchStrategy::Greedy, 0)
    };

    let reasoning = match strategy {
        SearchStrategy::Greedy => format!(
            "{} exclusion-involved item(s) > threshold {}: one greedy candidate with {} item(s)",
            involved.len(),
            exact_limit,
            candidates.first().map_or(0, |c| c.items.len())
        ),
        SearchStrategy::Exact {
            deadline_exceeded: true,
        } => format!(
            "Deadline reached after {} of {} subset(s): {} valid candidate(s) kept",
            subsets_examined,
            1u64 << involved.len(),
            candidates.len()
        ),
        _ => format!(
            "{} subset(s) of {} exclusion-involved item(s) examined: {} valid candidate(s)",
            subsets_examined,
            involved.len(),
            candidates.len()
        ),
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: ENUMERATION_RULE_ID.to_string(),
        rule_name: "Combination Enumeration".to_string(),
        legal_ref: String::new(),
        input: serde_json::json!({
            "independent": independent.len(),
            "involved": involved.len(),
            "pairs": pairs.len(),
            "threshold": threshold
        }),
        output: serde_json::json!({
            "strategy": strategy,
            "subsets_examined": subsets_examined,
            "candidates": candidates.len()
        }),
        reasoning,
    };

    EnumerationResult {
        candidates,
        strategy,
        subsets_examined,
        audit_step,
    }
}

/// Bitmasks of the involved items carrying each side of a pair.
fn pair_masks(involved: &[EligibleItem], pairs: &[ExclusionPair]) -> Vec<(u64, u64)> {
    let mask_of = |provision: &str| {
        involved
            .iter()
            .enumerate()
            .filter(|(_, item)| item.provision == provision)
            .fold(0u64, |mask, (i, _)| mask | (1u64 << i))
    };

    pairs
        .iter()
        .map(|pair| (mask_of(&pair.provision_a), mask_of(&pair.provision_b)))
        .collect()
}

fn exact_search(
    independent: &[EligibleItem],
    involved: &[EligibleItem],
    pairs: &[ExclusionPair],
    deadline: Deadline,
) -> (Vec<Candidate>, SearchStrategy, u64) {
    let masks = pair_masks(involved, pairs);
    let total = 1u64 << involved.len();

    let mut candidates = Vec::new();
    let mut examined = 0u64;
    let mut deadline_exceeded = false;

    for subset in 0..total {
        examined += 1;

        let valid = masks
            .iter()
            .all(|&(a, b)| subset & a == 0 || subset & b == 0);
        if valid {
            let mut items = independent.to_vec();
            items.extend(
                involved
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| subset & (1u64 << i) != 0)
                    .map(|(_, item)| item.clone()),
            );
            candidates.push(Candidate::new(candidates.len() + 1, items));
        }

        if subset + 1 < total && deadline.is_expired() {
            warn!(
                examined,
                total,
                found = candidates.len(),
                "Combination search deadline exceeded, keeping partial result"
            );
            deadline_exceeded = true;
            break;
        }
    }

    debug!(examined, candidates = candidates.len(), "Exact enumeration finished");

    (
        candidates,
        SearchStrategy::Exact { deadline_exceeded },
        examined,
    )
}

fn greedy_search(
    independent: &[EligibleItem],
    involved: &[EligibleItem],
    pairs: &[ExclusionPair],
) -> Vec<Candidate> {
    let mut ordered: Vec<&EligibleItem> = independent.iter().chain(involved).collect();
    ordered.sort_by_key(|item| std::cmp::Reverse(item.greedy_key()));

    let mut selected = Vec::new();
    let mut provisions: HashSet<&str> = HashSet::new();
    for item in ordered {
        if pairs
            .iter()
            .any(|pair| pair.conflicts(&item.provision, &provisions))
        {
            debug!(item_id = %item.item_id, "Greedy selection skipped conflicting item");
            continue;
        }
        provisions.insert(item.provision.as_str());
        selected.push(item.clone());
    }

    debug!(selected = selected.len(), "Greedy selection finished");
    vec![Candidate::new(1, selected)]
}
