//! Tunable search settings read from the system parameter store.

use std::time::Duration;

use tracing::warn;

use crate::models::AuditWarning;

use super::types::SystemParams;

/// Parameter key of the greedy fallback threshold.
pub const GREEDY_THRESHOLD_PARAM: &str = "greedy_fallback_threshold";

/// Parameter key of the search timeout in seconds.
pub const SEARCH_TIMEOUT_PARAM: &str = "combination_search_timeout";

/// Exclusion-involved item count above which the greedy fallback is used.
pub const DEFAULT_GREEDY_THRESHOLD: usize = 15;

/// Wall-clock budget of the exact enumeration, in seconds.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 120;

/// Settings that bound the combination search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Exact enumeration is used while the exclusion-involved set has at most
    /// this many items.
    pub greedy_threshold: usize,
    /// Deadline budget of the exact enumeration.
    pub search_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            greedy_threshold: DEFAULT_GREEDY_THRESHOLD,
            search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
        }
    }
}

impl SearchSettings {
    /// Resolves the settings from the parameter store.
    ///
    /// Missing or unparsable values fall back to the defaults. Each fallback
    /// is logged and reported as an [`AuditWarning`]; it never fails the run.
    ///
    /// # Example
    ///
    /// ```
    /// use refund_combination_engine::config::SearchSettings;
    ///
    /// let (settings, warnings) = SearchSettings::from_params(None);
    /// assert_eq!(settings.greedy_threshold, 15);
    /// assert_eq!(settings.search_timeout.as_secs(), 120);
    /// assert_eq!(warnings.len(), 1);
    /// ```
    pub fn from_params(params: Option<&SystemParams>) -> (Self, Vec<AuditWarning>) {
        let mut warnings = Vec::new();

        let Some(params) = params else {
            warn!(
                greedy_threshold = DEFAULT_GREEDY_THRESHOLD,
                search_timeout_secs = DEFAULT_SEARCH_TIMEOUT_SECS,
                "System parameter store unavailable, using defaults"
            );
            warnings.push(AuditWarning {
                code: "PARAMS_UNAVAILABLE".to_string(),
                message: "System parameter store unavailable; default threshold and timeout used"
                    .to_string(),
                severity: "low".to_string(),
            });
            return (Self::default(), warnings);
        };

        let greedy_threshold = parse_param(
            params,
            GREEDY_THRESHOLD_PARAM,
            DEFAULT_GREEDY_THRESHOLD,
            &mut warnings,
        );
        let timeout_secs = parse_param(
            params,
            SEARCH_TIMEOUT_PARAM,
            DEFAULT_SEARCH_TIMEOUT_SECS,
            &mut warnings,
        );

        (
            Self {
                greedy_threshold,
                search_timeout: Duration::from_secs(timeout_secs),
            },
            warnings,
        )
    }
}

fn parse_param<T>(
    params: &SystemParams,
    key: &str,
    default: T,
    warnings: &mut Vec<AuditWarning>,
) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let Some(raw) = params.get(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(param = key, value = raw, default = %default, "Unparsable system parameter, using default");
            warnings.push(AuditWarning {
                code: "PARAM_FALLBACK".to_string(),
                message: format!("Parameter '{}' value '{}' is invalid; using {}", key, raw, default),
                severity: "low".to_string(),
            });
            default
        }
    }
}
