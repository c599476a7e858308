//! Canonical dataset entry.

use crate::clusters::ClusterId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Text stored for an accession or cluster that could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// One structure/pocket instance of a benchmark dataset.
///
/// Paths are computed by naming convention only; whether the files exist
/// is the concern of whoever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Structure id plus chain letter; unique within a dataset family.
    pub code5: String,
    /// 4-character structure id, the prefix of `code5`.
    pub code: String,
    /// Cleaned protein structure.
    pub protein: PathBuf,
    /// Pocket representation.
    pub pocket: PathBuf,
    /// Bound ligand.
    pub ligand: PathBuf,
    /// Precomputed feature channels of the protein.
    pub protein_features: PathBuf,
    /// Pocket number from the listing (TOUGH-M1 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pocket_number: Option<u32>,
    /// Protein-family accession; `None` means unknown.
    pub accession: Option<String>,
    /// Sequence-identity cluster; `None` means unknown.
    pub cluster_id: Option<ClusterId>,
}

impl Entry {
    /// Structure id of a `code5`.
    pub fn code_of(code5: &str) -> String {
        code5.chars().take(4).collect()
    }

    /// Chain letter, if the `code5` carries one.
    pub fn chain(&self) -> Option<char> {
        self.code5.chars().nth(4)
    }

    pub fn accession_label(&self) -> &str {
        self.accession.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn cluster_label(&self) -> String {
        self.cluster_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Two entries handed to a matcher for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPair {
    pub first: Entry,
    pub second: Entry,
}

impl EntryPair {
    pub fn new(first: Entry, second: Entry) -> Self {
        Self { first, second }
    }
}

#[cfg(test)]
pub(crate) fn test_entry(code5: &str) -> Entry {
    Entry {
        code5: code5.to_string(),
        code: Entry::code_of(code5),
        protein: PathBuf::from(format!("{}_clean.pdb", code5)),
        pocket: PathBuf::from(format!("{}_site_1.pdb", code5)),
        ligand: PathBuf::from(format!("{}_lig_1.pdb", code5)),
        protein_features: PathBuf::from(format!("{}_clean.npz", code5)),
        pocket_number: None,
        accession: None,
        cluster_id: None,
    }
}
