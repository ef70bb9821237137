//! Orchestration of the combination search for a claim.
//!
//! [`CombinationEngine`] wires the calculation stages to two collaborators:
//! a [`ClaimSource`] that provides the records earlier stages produced, and a
//! [`ResultStore`] that receives the ranked combinations and verification
//! records. In-memory implementations of both are provided.

mod optimizer;
mod sources;
mod store;

pub use optimizer::CombinationEngine;
pub use sources::{ClaimRecords, ClaimSource, InMemoryClaimSource, SourceError};
pub use store::{InMemoryResultStore, ResultStore, StoreError};
