//! Reference table loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the reference
//! tables of the combination search from YAML files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

use super::types::{
    ExclusionRulesConfig, MinTaxRatesConfig, RdExemptionsConfig, ReferenceTables,
    SurtaxRulesConfig, SystemParams,
};

/// Loads and provides access to the reference tables.
///
/// # Directory Structure
///
/// ```text
/// config/reference/
/// ├── exclusion_rules.yaml   # Disallowed provision pairs by tax year
/// ├── min_tax_rates.yaml     # Minimum-tax brackets by entity size
/// ├── rd_exemptions.yaml     # R&D minimum-tax exemption shares
/// ├── surtax_rules.yaml      # Surtax exemption and rates by provision
/// └── system_params.yaml     # Optional tunable parameters
/// ```
///
/// # Example
///
/// ```no_run
/// use refund_combination_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/reference")?;
/// println!("{} exclusion rules", loader.tables().exclusion_rules().len());
/// # Ok::<(), refund_combination_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: Option<PathBuf>,
    tables: ReferenceTables,
}

impl ConfigLoader {
    /// Loads the reference tables from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - Any of the four required table files is missing
    /// - Any file contains invalid YAML
    ///
    /// A missing or unreadable `system_params.yaml` is not an error; the
    /// search then runs on its built-in defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let exclusion = Self::load_yaml::<ExclusionRulesConfig>(&path.join("exclusion_rules.yaml"))?;
        let min_tax = Self::load_yaml::<MinTaxRatesConfig>(&path.join("min_tax_rates.yaml"))?;
        let rd = Self::load_yaml::<RdExemptionsConfig>(&path.join("rd_exemptions.yaml"))?;
        let surtax = Self::load_yaml::<SurtaxRulesConfig>(&path.join("surtax_rules.yaml"))?;
        let params = Self::load_system_params(&path.join("system_params.yaml"));

        debug!(
            path = %path.display(),
            exclusion_rules = exclusion.rules.len(),
            min_tax_brackets = min_tax.brackets.len(),
            rd_rules = rd.rules.len(),
            surtax_rules = surtax.rules.len(),
            "Loaded reference tables"
        );

        let tables = ReferenceTables::new(
            exclusion.rules,
            min_tax.brackets,
            rd.rules,
            surtax.rules,
            params,
        );

        Ok(Self {
            root: Some(path.to_path_buf()),
            tables,
        })
    }

    /// Wraps tables that were built in memory.
    pub fn from_tables(tables: ReferenceTables) -> Self {
        Self { root: None, tables }
    }

    /// Loads a fresh copy of the tables from the directory this loader was
    /// created from. In-memory tables are returned unchanged.
    pub fn reload(&self) -> EngineResult<Self> {
        match &self.root {
            Some(root) => Self::load(root),
            None => Ok(self.clone()),
        }
    }

    /// Returns the loaded reference tables.
    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads the optional parameter store.
    fn load_system_params(path: &Path) -> Option<SystemParams> {
        if !path.exists() {
            debug!(path = %path.display(), "No system parameter file");
            return None;
        }

        match Self::load_yaml::<SystemParams>(path) {
            Ok(params) => Some(params),
            Err(err) => {
                warn!(error = %err, "System parameters unavailable, built-in defaults apply");
                None
            }
        }
    }
}
