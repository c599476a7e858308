//! Labeled evaluation pairs joined against an entry catalog.

use super::catalog::EntryCatalog;
use super::layout::{PairListing, read_csv_rows};
use crate::entry::EntryPair;
use crate::error::{PocketBenchError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Label token marking a positive pair in comma-separated listings.
pub const POSITIVE_TOKEN: &str = "active";

/// Pairs with one label each, in listing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairSet {
    pub pairs: Vec<EntryPair>,
    pub labels: Vec<bool>,
    /// Listing rows skipped because an id is not in the catalog.
    pub dropped: usize,
}

impl PairSet {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }
}

/// Joins a pair listing against a catalog.
///
/// Rows naming an id missing from the catalog are dropped, never fatal.
/// Duplicated rows are kept.
pub struct PairSetBuilder<'a> {
    catalog: &'a EntryCatalog,
    set: PairSet,
}

impl<'a> PairSetBuilder<'a> {
    pub fn new(catalog: &'a EntryCatalog) -> Self {
        Self {
            catalog,
            set: PairSet::default(),
        }
    }

    /// Build the pair set of `listing` in one go.
    pub fn build(catalog: &'a EntryCatalog, listing: &PairListing) -> Result<PairSet> {
        let mut builder = Self::new(catalog);
        match listing {
            PairListing::Labeled(path) => builder.add_labeled_file(path)?,
            PairListing::Split { positive, negative } => {
                builder.add_class_file(positive, true)?;
                builder.add_class_file(negative, false)?;
            }
        }
        Ok(builder.finish())
    }

    /// Add `id1,id2,label` rows; positive iff the label is `active`.
    pub fn add_labeled_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
        }

        let before = self.set.dropped;
        for row in read_csv_rows(path, 3)? {
            self.push(&row[0], &row[1], row[2] == POSITIVE_TOKEN);
        }
        self.report(path, before);
        Ok(())
    }

    /// Add whitespace-separated `id1 id2 ...` rows that all carry `label`.
    pub fn add_class_file(&mut self, path: &Path, label: bool) -> Result<()> {
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| PocketBenchError::io(path, e))?;

        let before = self.set.dropped;
        for (idx, line) in content.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (None, _) => continue,
                (Some(id1), Some(id2)) => {
                    self.push(id1, id2, label);
                }
                (Some(_), None) => {
                    return Err(PocketBenchError::listing(path, idx, "expected two ids"));
                }
            }
        }
        self.report(path, before);
        Ok(())
    }

    /// Add one pair if both ids resolve.
    pub fn push(&mut self, id1: &str, id2: &str, label: bool) -> bool {
        match (self.catalog.get(id1), self.catalog.get(id2)) {
            (Some(first), Some(second)) => {
                self.set
                    .pairs
                    .push(EntryPair::new(first.clone(), second.clone()));
                self.set.labels.push(label);
                true
            }
            _ => {
                debug!("Detection entry missing for {},{}", id1, id2);
                self.set.dropped += 1;
                false
            }
        }
    }

    fn report(&self, path: &Path, dropped_before: usize) {
        let dropped = self.set.dropped - dropped_before;
        if dropped > 0 {
            warn!(
                "{}: dropped {} pairs referencing entries missing from {}",
                path.display(),
                dropped,
                self.catalog.dataset()
            );
        }
    }

    pub fn finish(self) -> PairSet {
        info!(
            "{}: {} pairs ({} positive, {} negative)",
            self.catalog.dataset(),
            self.set.len(),
            self.set.positives(),
            self.set.negatives()
        );
        self.set
    }
}
