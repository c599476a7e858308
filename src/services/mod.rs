//! Remote structure services.
//!
//! Every network lookup the pipeline makes goes through one of the traits
//! below. The PDBe REST client implements all of them; tests use in-memory
//! fakes so catalog, pair and evaluation logic runs offline.

mod cache;
mod pdbe;

pub use cache::{LookupCache, Supersession};
pub use pdbe::PdbeClient;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One chain-to-family assignment from a structure mapping service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMapping {
    /// Protein-family accession (UniProt).
    pub accession: String,
    /// Author chain identifier within the structure.
    pub chain_id: String,
}

impl ChainMapping {
    pub fn new(accession: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            chain_id: chain_id.into(),
        }
    }
}

/// Obsolete-status lookup: the id superseding an obsolete entry.
pub trait ObsoleteLookup: Send + Sync {
    /// `Ok(None)` when the entry is current.
    fn superseded_by(&self, code: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Structure-to-accession mapping lookup.
pub trait AccessionLookup: Send + Sync {
    /// All chain mappings of a structure, in the order the service lists them.
    fn chain_mappings(&self, code: &str)
    -> impl Future<Output = Result<Vec<ChainMapping>>> + Send;
}

/// Experimental method lookup, used to recover truncated NMR entry ids.
pub trait ExperimentLookup: Send + Sync {
    fn experimental_methods(&self, code: &str)
    -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Convenience bound for a service that answers every lookup.
pub trait StructureService: ObsoleteLookup + AccessionLookup + ExperimentLookup + 'static {}

impl<T> StructureService for T where T: ObsoleteLookup + AccessionLookup + ExperimentLookup + 'static {}
