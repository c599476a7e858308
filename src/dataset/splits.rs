//! Train/test splits of a catalog for descriptor training.

use super::catalog::EntryCatalog;
use crate::entry::Entry;
use crate::error::{PocketBenchError, Result};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// How entries are assigned to folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Train and test are both the full catalog.
    None,
    /// Shuffled K-fold over individual entries.
    PdbFolds,
    /// Whole protein families per fold; unknown accessions are left out.
    AccessionFolds,
    /// Whole sequence clusters per fold; unknown clusters are left out.
    ClusterFolds,
}

impl FromStr for SplitStrategy {
    type Err = PocketBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(Self::None),
            "pdb-folds" => Ok(Self::PdbFolds),
            "accession-folds" | "uniprot-folds" => Ok(Self::AccessionFolds),
            "cluster-folds" | "seqclust" => Ok(Self::ClusterFolds),
            _ => Err(PocketBenchError::InvalidSplit(format!(
                "unknown strategy '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::PdbFolds => "pdb-folds",
            Self::AccessionFolds => "accession-folds",
            Self::ClusterFolds => "cluster-folds",
        };
        f.write_str(name)
    }
}

/// One train/test partition, both sides in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub train: Vec<Entry>,
    pub test: Vec<Entry>,
}

/// Split `catalog` and return fold `fold` (0-indexed) of `n_folds`.
///
/// Deterministic for a given `seed`. Group strategies keep every member
/// of a group on the same side.
pub fn split_entries(
    catalog: &EntryCatalog,
    strategy: SplitStrategy,
    n_folds: usize,
    fold: usize,
    seed: u64,
) -> Result<Split> {
    if strategy == SplitStrategy::None {
        let entries: Vec<Entry> = catalog.iter().cloned().collect();
        return Ok(Split {
            train: entries.clone(),
            test: entries,
        });
    }

    if n_folds < 2 {
        return Err(PocketBenchError::InvalidSplit(format!(
            "need at least 2 folds, got {}",
            n_folds
        )));
    }
    if fold >= n_folds {
        return Err(PocketBenchError::InvalidSplit(format!(
            "fold {} out of range for {} folds",
            fold, n_folds
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let split = match strategy {
        SplitStrategy::PdbFolds => {
            let entries: Vec<&Entry> = catalog.iter().collect();
            let mut order: Vec<usize> = (0..entries.len()).collect();
            order.shuffle(&mut rng);
            let test: HashSet<usize> = fold_slice(&order, n_folds, fold, "entries")?
                .iter()
                .copied()
                .collect();
            partition(
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| (test.contains(&i), e)),
            )
        }
        SplitStrategy::AccessionFolds => {
            group_split(catalog, &mut rng, n_folds, fold, |e| e.accession.clone())?
        }
        SplitStrategy::ClusterFolds => group_split(catalog, &mut rng, n_folds, fold, |e| {
            e.cluster_id.map(|c| c.to_string())
        })?,
        SplitStrategy::None => Split::default(),
    };

    info!(
        "{} fold {}/{} of {}: {} train, {} test",
        strategy,
        fold + 1,
        n_folds,
        catalog.dataset(),
        split.train.len(),
        split.test.len()
    );
    Ok(split)
}

fn group_split<F>(
    catalog: &EntryCatalog,
    rng: &mut StdRng,
    n_folds: usize,
    fold: usize,
    group_of: F,
) -> Result<Split>
where
    F: Fn(&Entry) -> Option<String>,
{
    let grouped: Vec<(String, &Entry)> = catalog
        .iter()
        .filter_map(|e| group_of(e).map(|g| (g, e)))
        .collect();

    let mut groups: Vec<&str> = grouped
        .iter()
        .map(|(g, _)| g.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    groups.shuffle(rng);

    let test: HashSet<&str> = fold_slice(&groups, n_folds, fold, "groups")?
        .iter()
        .copied()
        .collect();
    Ok(partition(
        grouped.iter().map(|(g, e)| (test.contains(g.as_str()), *e)),
    ))
}

/// The `fold`-th of `n_folds` contiguous chunks; the first `len % n_folds`
/// chunks are one longer.
fn fold_slice<'a, T>(items: &'a [T], n_folds: usize, fold: usize, what: &str) -> Result<&'a [T]> {
    if items.len() < n_folds {
        return Err(PocketBenchError::InvalidSplit(format!(
            "{} folds requested but only {} {}",
            n_folds,
            items.len(),
            what
        )));
    }

    let base = items.len() / n_folds;
    let extra = items.len() % n_folds;
    let start = fold * base + fold.min(extra);
    let len = base + usize::from(fold < extra);
    Ok(&items[start..start + len])
}

fn partition<'a>(items: impl Iterator<Item = (bool, &'a Entry)>) -> Split {
    let mut split = Split::default();
    for (is_test, entry) in items {
        if is_test {
            split.test.push(entry.clone());
        } else {
            split.train.push(entry.clone());
        }
    }
    split
}
