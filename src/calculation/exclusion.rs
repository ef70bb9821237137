//! Exclusion resolution.
//!
//! This module separates the eligible items of a claim into items that can
//! always be applied and items that take part in at least one effective
//! exclusion pair.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::config::ExclusionRule;
use crate::models::{AuditStep, EligibleItem};

/// Rule identifier recorded in the audit trace.
pub const EXCLUSION_RULE_ID: &str = "exclusion_resolution";

/// A pair of provisions that may not be applied together in the tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionPair {
    /// Identifier of the rule the pair comes from.
    pub rule_id: u32,
    /// First provision.
    pub provision_a: String,
    /// Second provision.
    pub provision_b: String,
    /// Condition note of the rule.
    pub condition_note: String,
    /// Legal citation of the rule.
    pub legal_basis: String,
}

impl ExclusionPair {
    fn from_rule(rule: &ExclusionRule) -> Self {
        Self {
            rule_id: rule.rule_id,
            provision_a: rule.provision_a.clone(),
            provision_b: rule.provision_b.clone(),
            condition_note: rule.condition_note.clone(),
            legal_basis: rule.legal_basis.clone(),
        }
    }

    /// Returns true if the pair names the provision.
    pub fn involves(&self, provision: &str) -> bool {
        self.provision_a == provision || self.provision_b == provision
    }

    /// Returns true if the items contain both provisions of the pair.
    pub fn is_violated_by(&self, items: &[EligibleItem]) -> bool {
        items.iter().any(|item| item.provision == self.provision_a)
            && items.iter().any(|item| item.provision == self.provision_b)
    }

    /// Returns true if applying `provision` next to an already selected
    /// provision would break the pair.
    pub fn conflicts(&self, provision: &str, selected: &HashSet<&str>) -> bool {
        (self.provision_a == provision && selected.contains(self.provision_b.as_str()))
            || (self.provision_b == provision && selected.contains(self.provision_a.as_str()))
    }
}

/// Returns true if the items break any of the pairs.
pub fn violates_any(items: &[EligibleItem], pairs: &[ExclusionPair]) -> bool {
    pairs.iter().any(|pair| pair.is_violated_by(items))
}

/// The result of separating items by exclusion involvement.
#[derive(Debug, Clone)]
pub struct ExclusionResolution {
    /// Items whose provision appears in no effective pair.
    pub independent: Vec<EligibleItem>,
    /// Items whose provision appears in at least one effective pair.
    pub involved: Vec<EligibleItem>,
    /// Effective pairs in rule order.
    pub pairs: Vec<ExclusionPair>,
    /// The audit step recording this resolution.
    pub audit_step: AuditStep,
}

/// Separates eligible items into independent and exclusion-involved sets.
///
/// A rule is effective when it is in force for the tax year, disallows
/// simultaneous application, and both of its provisions occur among the
/// items. A rule repeated for the same provision pair yields a single
/// effective pair. Input order is kept in both output sets.
///
/// # Arguments
///
/// * `items` - The applicable eligible items of the claim
/// * `rules` - All exclusion rules
/// * `tax_year` - The tax year of the claim
/// * `step_number` - The step number for audit trail sequencing
///
/// # Example
///
/// ```
/// use refund_combination_engine::calculation::resolve_exclusions;
/// use refund_combination_engine::config::ExclusionRule;
/// use refund_combination_engine::models::{EligibleItem, ItemKind};
///
/// let items = vec![
///     EligibleItem::new("A", "ART-63", ItemKind::Exemption, 1_000),
///     EligibleItem::new("B", "ART-24", ItemKind::Credit, 800),
///     EligibleItem::new("C", "ART-25-6", ItemKind::Credit, 300),
/// ];
/// let rules = vec![ExclusionRule {
///     rule_id: 4,
///     provision_a: "ART-63".to_string(),
///     provision_b: "ART-24".to_string(),
///     year_from: 2021,
///     year_to: None,
///     allowed: false,
///     condition_note: String::new(),
///     legal_basis: String::new(),
/// }];
///
/// let result = resolve_exclusions(&items, &rules, 2024, 1);
/// assert_eq!(result.independent.len(), 1);
/// assert_eq!(result.involved.len(), 2);
/// assert_eq!(result.pairs.len(), 1);
/// ```
pub fn resolve_exclusions(
    items: &[EligibleItem],
    rules: &[ExclusionRule],
    tax_year: i32,
    step_number: u32,
) -> ExclusionResolution {
    let provisions: HashSet<&str> = items.iter().map(|item| item.provision.as_str()).collect();

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut pairs = Vec::new();
    for rule in rules {
        if rule.allowed || !rule.applies_in(tax_year) {
            continue;
        }
        let (a, b) = (rule.provision_a.as_str(), rule.provision_b.as_str());
        if !provisions.contains(a) || !provisions.contains(b) {
            continue;
        }
        let key = if a <= b { (a, b) } else { (b, a) };
        if seen.insert(key) {
            pairs.push(ExclusionPair::from_rule(rule));
        }
    }

    let (involved, independent): (Vec<EligibleItem>, Vec<EligibleItem>) = items
        .iter()
        .cloned()
        .partition(|item| pairs.iter().any(|pair| pair.involves(&item.provision)));

    debug!(
        tax_year,
        independent = independent.len(),
        involved = involved.len(),
        pairs = pairs.len(),
        "Resolved exclusion groups"
    );

    let legal_ref = pairs
        .iter()
        .map(|pair| pair.legal_basis.as_str())
        .filter(|basis| !basis.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    let audit_step = AuditStep {
        step_number,
        rule_id: EXCLUSION_RULE_ID.to_string(),
        rule_name: "Exclusion Resolution".to_string(),
        legal_ref,
        input: serde_json::json!({
            "tax_year": tax_year,
            "item_count": items.len(),
            "rule_count": rules.len()
        }),
        output: serde_json::json!({
            "independent": independent.iter().map(|i| &i.item_id).collect::<Vec<_>>(),
            "involved": involved.iter().map(|i| &i.item_id).collect::<Vec<_>>(),
            "pairs": &pairs
        }),
        reasoning: format!(
            "{} effective exclusion pair(s) in {}; {} independent item(s), {} exclusion-involved item(s)",
            pairs.len(),
            tax_year,
            independent.len(),
            involved.len()
        ),
    };

    ExclusionResolution {
        independent,
        involved,
        pairs,
        audit_step,
    }
}
