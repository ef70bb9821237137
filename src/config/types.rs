//! Reference table types for the combination search.
//!
//! This module contains the strongly-typed table structures that are
//! deserialized from the YAML files of a reference directory.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{EntitySize, RdTier};

/// A rule stating whether two provisions may be claimed together.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExclusionRule {
    /// Identifier of the rule.
    pub rule_id: u32,
    /// First provision of the pair.
    pub provision_a: String,
    /// Second provision of the pair.
    pub provision_b: String,
    /// First tax year the rule applies to.
    pub year_from: i32,
    /// Last tax year the rule applies to; open-ended when absent.
    #[serde(default)]
    pub year_to: Option<i32>,
    /// Whether simultaneous application is allowed.
    pub allowed: bool,
    /// Free-text condition under which the rule applies.
    #[serde(default)]
    pub condition_note: String,
    /// Legal citation of the rule.
    #[serde(default)]
    pub legal_basis: String,
}

impl ExclusionRule {
    /// Returns true if the rule is in force for the tax year.
    pub fn applies_in(&self, tax_year: i32) -> bool {
        self.year_from <= tax_year && self.year_to.is_none_or(|to| tax_year <= to)
    }
}

/// A minimum-tax rate for an entity size and tax-base bracket.
///
/// Brackets are half-open: `bracket_min <= base < bracket_max`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MinTaxBracket {
    /// Entity size the bracket applies to.
    pub entity_size: EntitySize,
    /// Inclusive lower bound of the tax base.
    pub bracket_min: i64,
    /// Exclusive upper bound of the tax base; unbounded when absent.
    #[serde(default)]
    pub bracket_max: Option<i64>,
    /// Minimum-tax rate in percent.
    pub rate_percent: Decimal,
}

impl MinTaxBracket {
    /// Returns true if the bracket covers the entity size and tax base.
    pub fn covers(&self, entity_size: EntitySize, tax_base: i64) -> bool {
        self.entity_size == entity_size
            && self.bracket_min <= tax_base
            && self.bracket_max.is_none_or(|max| tax_base < max)
    }
}

/// The share of an R&D credit exempted from the minimum-tax ceiling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RdExemptionRule {
    /// R&D tier.
    pub tier: RdTier,
    /// Entity size.
    pub entity_size: EntitySize,
    /// Exempted share in percent (0 to 100).
    pub exempt_percent: Decimal,
}

/// Surtax treatment of a provision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SurtaxRule {
    /// The provision code.
    pub provision: String,
    /// Whether the provision is exempt from surtax.
    #[serde(default)]
    pub exempt: bool,
    /// Surtax rate in percent; the default rate applies when absent.
    #[serde(default)]
    pub rate_percent: Option<Decimal>,
    /// Legal citation.
    #[serde(default)]
    pub legal_basis: String,
}

/// exclusion_rules.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionRulesConfig {
    /// All exclusion rules.
    pub rules: Vec<ExclusionRule>,
}

/// min_tax_rates.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct MinTaxRatesConfig {
    /// All minimum-tax brackets.
    pub brackets: Vec<MinTaxBracket>,
}

/// rd_exemptions.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct RdExemptionsConfig {
    /// All R&D exemption rules.
    pub rules: Vec<RdExemptionRule>,
}

/// surtax_rules.yaml file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct SurtaxRulesConfig {
    /// All surtax rules.
    pub rules: Vec<SurtaxRule>,
}

/// system_params.yaml file structure.
///
/// Values are kept as strings and parsed where they are used, so a bad value
/// degrades to that parameter's default instead of failing the load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemParams {
    /// Parameter values by key.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SystemParams {
    /// Returns the raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// All reference data the search reads.
///
/// Loaded once and shared read-only; it is never mutated during a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    exclusion_rules: Vec<ExclusionRule>,
    min_tax_brackets: Vec<MinTaxBracket>,
    rd_exemptions: Vec<RdExemptionRule>,
    surtax_rules: HashMap<String, SurtaxRule>,
    system_params: Option<SystemParams>,
}

impl ReferenceTables {
    /// Creates reference tables from their component parts.
    pub fn new(
        exclusion_rules: Vec<ExclusionRule>,
        min_tax_brackets: Vec<MinTaxBracket>,
        rd_exemptions: Vec<RdExemptionRule>,
        surtax_rules: Vec<SurtaxRule>,
        system_params: Option<SystemParams>,
    ) -> Self {
        let mut sorted_brackets = min_tax_brackets;
        sorted_brackets.sort_by_key(|bracket| bracket.bracket_min);
        Self {
            exclusion_rules,
            min_tax_brackets: sorted_brackets,
            rd_exemptions,
            surtax_rules: surtax_rules
                .into_iter()
                .map(|rule| (rule.provision.clone(), rule))
                .collect(),
            system_params,
        }
    }

    /// Returns all exclusion rules.
    pub fn exclusion_rules(&self) -> &[ExclusionRule] {
        &self.exclusion_rules
    }

    /// Returns the exclusion rules in force for the tax year.
    pub fn exclusion_rules_for_year(&self, tax_year: i32) -> Vec<&ExclusionRule> {
        self.exclusion_rules
            .iter()
            .filter(|rule| rule.applies_in(tax_year))
            .collect()
    }

    /// Returns all minimum-tax brackets, lowest bracket first.
    pub fn min_tax_brackets(&self) -> &[MinTaxBracket] {
        &self.min_tax_brackets
    }

    /// Looks up the minimum-tax rate in percent.
    pub fn min_tax_percent(&self, entity_size: EntitySize, tax_base: i64) -> Option<Decimal> {
        self.min_tax_brackets
            .iter()
            .find(|bracket| bracket.covers(entity_size, tax_base))
            .map(|bracket| bracket.rate_percent)
    }

    /// Looks up the R&D exemption percentage.
    pub fn rd_exempt_percent(&self, tier: RdTier, entity_size: EntitySize) -> Option<Decimal> {
        self.rd_exemptions
            .iter()
            .find(|rule| rule.tier == tier && rule.entity_size == entity_size)
            .map(|rule| rule.exempt_percent)
    }

    /// Looks up the surtax rule of a provision.
    pub fn surtax_rule(&self, provision: &str) -> Option<&SurtaxRule> {
        self.surtax_rules.get(provision)
    }

    /// Returns the system parameter store, if one was loaded.
    pub fn system_params(&self) -> Option<&SystemParams> {
        self.system_params.as_ref()
    }
}
