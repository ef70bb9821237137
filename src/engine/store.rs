//! Result persistence for ranked combinations and verification records.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::models::{ExclusionVerification, RankedCombination};

/// Storage abstraction for the results of a claim.
///
/// A run deletes the previous results of its claim before writing new ones,
/// so a store never holds results of two runs for the same claim.
pub trait ResultStore: Send + Sync {
    /// Removes every stored result of the claim.
    fn delete_claim(&self, claim_id: &str) -> Result<(), StoreError>;
    /// Stores ranked combinations of the claim.
    fn save_combinations(
        &self,
        claim_id: &str,
        combinations: &[RankedCombination],
    ) -> Result<(), StoreError>;
    /// Stores exclusion-verification records of the claim.
    fn save_verifications(
        &self,
        claim_id: &str,
        verifications: &[ExclusionVerification],
    ) -> Result<(), StoreError>;
    /// Stored combinations of the claim, by rank.
    fn combinations(&self, claim_id: &str) -> Result<Vec<RankedCombination>, StoreError>;
    /// Stored verification records of the claim.
    fn verifications(&self, claim_id: &str) -> Result<Vec<ExclusionVerification>, StoreError>;
}

/// Error enumeration for result store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with the same key is already stored for the claim.
    #[error("record '{key}' already stored for claim '{claim_id}'")]
    Conflict {
        /// The claim.
        claim_id: String,
        /// The duplicated key.
        key: String,
    },
    /// The store could not be reached.
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default, Clone)]
struct ClaimResults {
    combinations: BTreeMap<String, RankedCombination>,
    verifications: BTreeMap<String, ExclusionVerification>,
}

/// Result store backed by a shared in-memory map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResultStore {
    results: Arc<Mutex<BTreeMap<String, ClaimResults>>>,
}

impl InMemoryResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_results<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, ClaimResults>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|_| StoreError::Unavailable("result store mutex poisoned".to_string()))?;
        f(&mut guard)
    }
}

impl ResultStore for InMemoryResultStore {
    fn delete_claim(&self, claim_id: &str) -> Result<(), StoreError> {
        self.with_results(|results| {
            results.remove(claim_id);
            Ok(())
        })
    }

    fn save_combinations(
        &self,
        claim_id: &str,
        combinations: &[RankedCombination],
    ) -> Result<(), StoreError> {
        self.with_results(|results| {
            let entry = results.entry(claim_id.to_string()).or_default();
            if let Some(dup) = combinations
                .iter()
                .find(|c| entry.combinations.contains_key(&c.combo_id))
            {
                return Err(StoreError::Conflict {
                    claim_id: claim_id.to_string(),
                    key: dup.combo_id.clone(),
                });
            }
            for combination in combinations {
                entry
                    .combinations
                    .insert(combination.combo_id.clone(), combination.clone());
            }
            Ok(())
        })
    }

    fn save_verifications(
        &self,
        claim_id: &str,
        verifications: &[ExclusionVerification],
    ) -> Result<(), StoreError> {
        self.with_results(|results| {
            let entry = results.entry(claim_id.to_string()).or_default();
            if let Some(dup) = verifications
                .iter()
                .find(|v| entry.verifications.contains_key(&v.verify_id))
            {
                return Err(StoreError::Conflict {
                    claim_id: claim_id.to_string(),
                    key: dup.verify_id.clone(),
                });
            }
            for verification in verifications {
                entry
                    .verifications
                    .insert(verification.verify_id.clone(), verification.clone());
            }
            Ok(())
        })
    }

    fn combinations(&self, claim_id: &str) -> Result<Vec<RankedCombination>, StoreError> {
        self.with_results(|results| {
            let mut stored: Vec<RankedCombination> = results
                .get(claim_id)
                .map(|r| r.combinations.values().cloned().collect())
                .unwrap_or_default();
            stored.sort_by_key(|c| c.rank);
            Ok(stored)
        })
    }

    fn verifications(&self, claim_id: &str) -> Result<Vec<ExclusionVerification>, StoreError> {
        self.with_results(|results| {
            Ok(results
                .get(claim_id)
                .map(|r| r.verifications.values().cloned().collect())
                .unwrap_or_default())
        })
    }
}
