//! Best-effort structure chain to protein-family accession resolution.

use crate::services::AccessionLookup;
use log::warn;
use std::sync::Arc;

/// Resolves `(structure, chain)` to a UniProt accession.
///
/// Never fails: transport errors, malformed answers and unmapped chains
/// all come back as `None` (the "unknown" sentinel) with a warning.
pub struct AccessionResolver<A> {
    lookup: Arc<A>,
}

impl<A> Clone for AccessionResolver<A> {
    fn clone(&self) -> Self {
        Self {
            lookup: Arc::clone(&self.lookup),
        }
    }
}

impl<A: AccessionLookup> AccessionResolver<A> {
    pub fn new(lookup: Arc<A>) -> Self {
        Self { lookup }
    }

    /// Accession of `chain_id` in `structure_id`.
    ///
    /// An empty `chain_id` accepts any chain. When several families claim
    /// the chain, the first one listed wins.
    pub async fn resolve(&self, structure_id: &str, chain_id: &str) -> Option<String> {
        let mappings = match self.lookup.chain_mappings(structure_id).await {
            Ok(mappings) => mappings,
            Err(e) => {
                warn!("PDB not found {} {}: {}", structure_id, chain_id, e);
                return None;
            }
        };

        let mut result: Option<String> = None;
        for mapping in mappings
            .iter()
            .filter(|m| chain_id.is_empty() || m.chain_id == chain_id)
        {
            match &result {
                None => result = Some(mapping.accession.clone()),
                Some(winner) if *winner != mapping.accession => {
                    warn!(
                        "Duplicate accession for {} chain {:?}: keeping {}, ignoring {}",
                        structure_id, chain_id, winner, mapping.accession
                    );
                }
                Some(_) => {}
            }
        }

        if result.is_none() {
            warn!(
                "No accession found for {} chain {:?}",
                structure_id, chain_id
            );
        }
        result
    }
}
