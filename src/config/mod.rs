//! Reference data loading and management for the combination search.
//!
//! This module loads exclusion rules, minimum-tax brackets, R&D exemption
//! shares, surtax rules and tunable system parameters from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use refund_combination_engine::config::{ConfigLoader, SearchSettings};
//!
//! let loader = ConfigLoader::load("./config/reference").unwrap();
//! let (settings, _warnings) = SearchSettings::from_params(loader.tables().system_params());
//! println!("Greedy threshold: {}", settings.greedy_threshold);
//! ```

mod loader;
mod settings;
mod types;

pub use loader::ConfigLoader;
pub use settings::{
    DEFAULT_GREEDY_THRESHOLD, DEFAULT_SEARCH_TIMEOUT_SECS, GREEDY_THRESHOLD_PARAM,
    SEARCH_TIMEOUT_PARAM, SearchSettings,
};
pub use types::{
    ExclusionRule, ExclusionRulesConfig, MinTaxBracket, MinTaxRatesConfig, RdExemptionRule,
    RdExemptionsConfig, ReferenceTables, SurtaxRule, SurtaxRulesConfig, SystemParams,
};
