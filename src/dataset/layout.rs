//! Fixed on-disk conventions of the supported benchmark corpora.
//!
//! Every dataset tag resolves once to a static [`PathConvention`]; all
//! paths of that dataset are derived from it plus the structure data root.

use crate::error::{PocketBenchError, Result};
use crate::persistence::DEFAULT_BUNDLE_FILENAME;
use csv::{ReaderBuilder, Trim};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Dataset family; decides directory layout and label source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// TOUGH-M1 (Govindaraj and Brylinski).
    ToughM1,
    /// ProSPECCTs (Ehrt et al.).
    Prospeccts,
}

impl Family {
    /// Directory of the family below the structure data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Family::ToughM1 => "TOUGH-M1",
            Family::Prospeccts => "prospeccts",
        }
    }
}

/// Naming convention of one dataset variant.
#[derive(Debug, PartialEq, Eq)]
pub struct PathConvention {
    pub tag: &'static str,
    pub family: Family,
    /// Directory holding the structures and (for ProSPECCTs) the listing.
    pub structure_dir: &'static str,
    /// Sub directory with the per-structure files (ProSPECCTs only).
    pub sub_dir: &'static str,
    /// Listing enumerating the dataset's structures.
    pub listing: &'static str,
}

const fn prospeccts(
    tag: &'static str,
    structure_dir: &'static str,
    sub_dir: &'static str,
    listing: &'static str,
) -> PathConvention {
    PathConvention {
        tag,
        family: Family::Prospeccts,
        structure_dir,
        sub_dir,
        listing,
    }
}

/// All supported datasets.
pub const CONVENTIONS: &[PathConvention] = &[
    PathConvention {
        tag: "TOUGH-M1",
        family: Family::ToughM1,
        structure_dir: "TOUGH-M1_dataset",
        sub_dir: "",
        listing: "TOUGH-M1_pocket.list",
    },
    prospeccts("P1", "identical_structures", "identical_structures", "identical_structures.csv"),
    prospeccts(
        "P1.2",
        "identical_structures_similar_ligands",
        "identical_structures_similar_ligands",
        "identical_structures_similar_ligands.csv",
    ),
    prospeccts("P2", "NMR_structures", "NMR_structures", "NMR_structures.csv"),
    prospeccts("P3", "decoy", "decoy_structures", "decoy_structures5.csv"),
    prospeccts("P4", "decoy", "decoy_shape_structures", "decoy_structures5.csv"),
    prospeccts("P5", "kahraman_structures", "kahraman_structures", "kahraman_structures80.csv"),
    prospeccts("P5.2", "kahraman_structures", "kahraman_structures", "kahraman_structures.csv"),
    prospeccts("P6", "barelier_structures", "barelier_structures", "barelier_structures.csv"),
    prospeccts(
        "P6.2",
        "barelier_structures",
        "barelier_structures_cofactors",
        "barelier_structures.csv",
    ),
    prospeccts("P7", "review_structures", "review_structures", "review_structures.csv"),
];

/// Look up a dataset tag (case-insensitive).
pub fn convention(tag: &str) -> Result<&'static PathConvention> {
    CONVENTIONS
        .iter()
        .find(|c| c.tag.eq_ignore_ascii_case(tag.trim()))
        .ok_or_else(|| PocketBenchError::UnknownDataset(tag.to_string()))
}

/// Where a dataset's labeled pairs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairListing {
    /// Comma-separated `id1,id2,label`; label `active` is positive.
    Labeled(PathBuf),
    /// Whitespace-separated `id1 id2 ...` files, one per class.
    Split { positive: PathBuf, negative: PathBuf },
}

/// File references of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    pub protein: PathBuf,
    pub pocket: PathBuf,
    pub ligand: PathBuf,
    pub protein_features: PathBuf,
}

/// A structure as enumerated by a dataset listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedStructure {
    pub code5: String,
    /// 1-indexed pocket number (TOUGH-M1 only).
    pub pocket_number: Option<u32>,
}

/// A dataset convention bound to a structure data root.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    data_dir: PathBuf,
    convention: &'static PathConvention,
}

impl DatasetLayout {
    pub fn new(data_dir: impl Into<PathBuf>, tag: &str) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.into(),
            convention: convention(tag)?,
        })
    }

    pub fn tag(&self) -> &'static str {
        self.convention.tag
    }

    pub fn family(&self) -> Family {
        self.convention.family
    }

    pub fn convention(&self) -> &'static PathConvention {
        self.convention
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `{data}/TOUGH-M1` or `{data}/prospeccts`.
    pub fn family_dir(&self) -> PathBuf {
        self.data_dir.join(self.family().dir_name())
    }

    pub fn structure_root(&self) -> PathBuf {
        self.family_dir().join(self.convention.structure_dir)
    }

    fn features_root(&self) -> PathBuf {
        self.data_dir
            .join("processed")
            .join("htmd")
            .join(self.family().dir_name())
            .join(self.convention.structure_dir)
    }

    pub fn listing_path(&self) -> PathBuf {
        match self.family() {
            Family::ToughM1 => self.family_dir().join(self.convention.listing),
            Family::Prospeccts => self.structure_root().join(self.convention.listing),
        }
    }

    pub fn pair_listing(&self) -> PairListing {
        match self.family() {
            Family::ToughM1 => PairListing::Split {
                positive: self.family_dir().join("TOUGH-M1_positive.list"),
                negative: self.family_dir().join("TOUGH-M1_negative.list"),
            },
            Family::Prospeccts => PairListing::Labeled(self.listing_path()),
        }
    }

    /// Mapping bundle location; shared by all variants of a family.
    pub fn bundle_path(&self) -> PathBuf {
        self.family_dir().join(DEFAULT_BUNDLE_FILENAME)
    }

    pub fn entry_paths(&self, code5: &str, pocket_number: Option<u32>) -> EntryPaths {
        match self.family() {
            Family::ToughM1 => {
                let dir = self.structure_root().join(code5);
                let pocket_idx = pocket_number.unwrap_or(1).saturating_sub(1);
                EntryPaths {
                    protein: dir.join(format!("{}.pdb", code5)),
                    pocket: dir
                        .join(format!("{}_out", code5))
                        .join("pockets")
                        .join(format!("pocket{}_vert.pqr", pocket_idx)),
                    ligand: dir.join(format!("{}00.pdb", code5)),
                    protein_features: self
                        .features_root()
                        .join(code5)
                        .join(format!("{}.npz", code5)),
                }
            }
            Family::Prospeccts => {
                let dir = self.structure_root().join(self.convention.sub_dir);
                EntryPaths {
                    protein: dir.join(format!("{}_clean.pdb", code5)),
                    pocket: dir.join(format!("{}_site_1.pdb", code5)),
                    ligand: dir.join(format!("{}_lig_1.pdb", code5)),
                    protein_features: self
                        .features_root()
                        .join(self.convention.sub_dir)
                        .join(format!("{}_clean.npz", code5)),
                }
            }
        }
    }

    /// Structures referenced by the dataset listing, in listing order.
    ///
    /// ProSPECCTs ids may repeat (they come from pair rows); TOUGH-M1 ids
    /// are listed once each.
    pub fn read_listed_structures(&self) -> Result<Vec<ListedStructure>> {
        let path = self.listing_path();
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path));
        }

        match self.family() {
            Family::ToughM1 => read_pocket_list(&path),
            Family::Prospeccts => Ok(read_csv_rows(&path, 2)?
                .into_iter()
                .flat_map(|row| row.into_iter().take(2))
                .map(|code5| ListedStructure {
                    code5,
                    pocket_number: None,
                })
                .collect()),
        }
    }
}

impl fmt::Display for DatasetLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tag(), self.structure_root().display())
    }
}

/// `code5 pocket_nr ...` lines of the TOUGH-M1 pocket list.
fn read_pocket_list(path: &Path) -> Result<Vec<ListedStructure>> {
    let content = fs::read_to_string(path).map_err(|e| PocketBenchError::io(path, e))?;

    let mut structures = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(code5) = tokens.next() else {
            continue;
        };
        let pocket_number = tokens
            .next()
            .ok_or_else(|| PocketBenchError::listing(path, idx, "missing pocket number"))?
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| PocketBenchError::listing(path, idx, "pocket number must be >= 1"))?;

        structures.push(ListedStructure {
            code5: code5.to_string(),
            pocket_number: Some(pocket_number),
        });
    }
    Ok(structures)
}

/// Rows of a headerless comma-separated listing with at least `min_columns` fields.
pub(crate) fn read_csv_rows(path: &Path, min_columns: usize) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(source) => PocketBenchError::io(path, source),
            other => PocketBenchError::Serialization(format!("{:?}", other)),
        })?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() < min_columns {
            let line = record
                .position()
                .map(|p| p.line() as usize - 1)
                .unwrap_or(idx);
            return Err(PocketBenchError::listing(
                path,
                line,
                format!("expected {} columns, found {}", min_columns, record.len()),
            ));
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
