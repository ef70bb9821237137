//! Error types for the refund combination engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while searching for the optimal
//! credit/exemption combination of a claim.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stage of the combination search in which an error occurred.
///
/// Every calculation error is tagged with one of these steps so callers can
/// tell how far a run progressed before it failed.
///
/// # Example
///
/// ```
/// use refund_combination_engine::error::CalculationStep;
///
/// assert_eq!(CalculationStep::Settlement.to_string(), "settlement");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStep {
    /// Loading the claim records and eligible items.
    LoadInputs,
    /// Separating independent items from exclusion-involved items.
    ExclusionResolution,
    /// Enumerating candidate combinations.
    Enumeration,
    /// Applying items against the minimum-tax ceiling.
    Settlement,
    /// Ordering candidates by net refund.
    Ranking,
    /// Writing results to the result store.
    Persist,
}

impl CalculationStep {
    /// Returns the snake_case code of the step.
    pub fn code(&self) -> &'static str {
        match self {
            CalculationStep::LoadInputs => "load_inputs",
            CalculationStep::ExclusionResolution => "exclusion_resolution",
            CalculationStep::Enumeration => "enumeration",
            CalculationStep::Settlement => "settlement",
            CalculationStep::Ranking => "ranking",
            CalculationStep::Persist => "persist",
        }
    }
}

impl fmt::Display for CalculationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The main error type for the refund combination engine.
///
/// # Example
///
/// ```
/// use refund_combination_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/min_tax_rates.yaml".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Configuration file not found: /missing/min_tax_rates.yaml"
/// );
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A record the search cannot run without is missing for the claim.
    #[error("[{step}] Required record '{record}' not found for claim '{claim_id}'")]
    MissingRecord {
        /// The claim being processed.
        claim_id: String,
        /// The name of the missing record.
        record: String,
        /// The step that required the record.
        step: CalculationStep,
    },

    /// Any other failure during search, settlement or persistence.
    #[error("[{step}] Calculation failed for claim '{claim_id}': {message}")]
    Calculation {
        /// The claim being processed.
        claim_id: String,
        /// The step in which the failure occurred.
        step: CalculationStep,
        /// A description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Builds a step-tagged calculation error.
    pub fn calculation(
        claim_id: impl Into<String>,
        step: CalculationStep,
        message: impl Into<String>,
    ) -> Self {
        EngineError::Calculation {
            claim_id: claim_id.into(),
            step,
            message: message.into(),
        }
    }

    /// Returns the step this error is tagged with, if any.
    pub fn step(&self) -> Option<CalculationStep> {
        match self {
            EngineError::MissingRecord { step, .. } | EngineError::Calculation { step, .. } => {
                Some(*step)
            }
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => None,
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
