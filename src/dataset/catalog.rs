//! Entry catalog: the canonical set of entries of one dataset.

use super::layout::DatasetLayout;
use crate::entry::Entry;
use crate::error::Result;
use crate::persistence::{MappingBundle, load_bundle};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Entries of one dataset keyed by `code5`.
///
/// Iteration is in `code5` order, so identical inputs always produce the
/// same catalog.
#[derive(Debug, Clone)]
pub struct EntryCatalog {
    dataset: &'static str,
    entries: BTreeMap<String, Entry>,
}

impl EntryCatalog {
    /// Build entries from the dataset listing.
    ///
    /// With a bundle, entries are annotated from it; without one every
    /// entry's accession and cluster are unknown.
    pub fn build(layout: &DatasetLayout, bundle: Option<&MappingBundle>) -> Result<Self> {
        let listed = layout.read_listed_structures()?;

        let mut entries = BTreeMap::new();
        let mut duplicates = 0usize;
        let mut unmapped = 0usize;

        for structure in listed {
            let btree_map::Entry::Vacant(slot) = entries.entry(structure.code5.clone()) else {
                duplicates += 1;
                continue;
            };

            let paths = layout.entry_paths(&structure.code5, structure.pocket_number);
            let (accession, cluster_id) = match bundle {
                Some(bundle) => {
                    if !bundle.contains(&structure.code5) {
                        debug!("{} missing from mapping bundle", structure.code5);
                        unmapped += 1;
                    }
                    (
                        bundle.accession(&structure.code5),
                        bundle.cluster(&structure.code5),
                    )
                }
                None => (None, None),
            };

            slot.insert(Entry {
                code: Entry::code_of(&structure.code5),
                code5: structure.code5,
                protein: paths.protein,
                pocket: paths.pocket,
                ligand: paths.ligand,
                protein_features: paths.protein_features,
                pocket_number: structure.pocket_number,
                accession,
                cluster_id,
            });
        }

        // ProSPECCTs listings name every structure once per pair it appears in.
        if duplicates > 0 && layout.family() == super::Family::ToughM1 {
            warn!(
                "{}: {} duplicate structures in listing, keeping the first occurrence",
                layout.tag(),
                duplicates
            );
        }
        if unmapped > 0 {
            warn!(
                "{}: {} entries missing from the mapping bundle, annotated as unknown",
                layout.tag(),
                unmapped
            );
        }
        info!("{}: {} entries", layout.tag(), entries.len());

        Ok(Self {
            dataset: layout.tag(),
            entries,
        })
    }

    /// Build with annotations from the dataset's persisted mapping bundle.
    pub fn load(layout: &DatasetLayout) -> Result<Self> {
        let bundle = load_bundle(&layout.bundle_path())?;
        Self::build(layout, Some(&bundle))
    }

    /// Build without annotations (no bundle needed).
    pub fn unannotated(layout: &DatasetLayout) -> Result<Self> {
        Self::build(layout, None)
    }

    pub fn dataset(&self) -> &'static str {
        self.dataset
    }

    pub fn get(&self, code5: &str) -> Option<&Entry> {
        self.entries.get(code5)
    }

    pub fn contains(&self, code5: &str) -> bool {
        self.entries.contains_key(code5)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PocketBenchError;
    use crate::persistence::save_bundle;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn prospeccts_fixture() -> (TempDir, DatasetLayout) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("prospeccts").join("kahraman_structures");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("kahraman_structures80.csv"),
            "1a0iA,1a0jA,active\n1a0iA,2b0cB,inactive\n2b0cB,1a0jA,inactive\n",
        )
        .unwrap();
        let layout = DatasetLayout::new(dir.path(), "P5").unwrap();
        (dir, layout)
    }

    #[test]
    fn test_build_without_bundle() {
        let (_dir, layout) = prospeccts_fixture();
        let catalog = EntryCatalog::unannotated(&layout).unwrap();

        assert_eq!(catalog.dataset(), "P5");
        assert_eq!(catalog.len(), 3);
        let codes: Vec<_> = catalog.iter().map(|e| e.code5.as_str()).collect();
        assert_eq!(codes, vec!["1a0iA", "1a0jA", "2b0cB"]);

        let entry = catalog.get("2b0cB").unwrap();
        assert_eq!(entry.code, "2b0c");
        assert!(entry.accession.is_none());
        assert!(entry.cluster_id.is_none());
        assert!(entry.protein.ends_with("kahraman_structures/2b0cB_clean.pdb"));
    }

    #[test]
    fn test_build_with_bundle() {
        let (_dir, layout) = prospeccts_fixture();
        let mut bundle = MappingBundle::new("prospeccts", 30);
        bundle.insert("1a0iA", Some("P00918"), Some(4));
        bundle.insert("1a0jA", None, Some(9));

        let catalog = EntryCatalog::build(&layout, Some(&bundle)).unwrap();
        let first = catalog.get("1a0iA").unwrap();
        assert_eq!(first.accession.as_deref(), Some("P00918"));
        assert_eq!(first.cluster_id, Some(4));

        let second = catalog.get("1a0jA").unwrap();
        assert_eq!(second.accession, None);
        assert_eq!(second.cluster_id, Some(9));

        // Not in the bundle at all.
        let third = catalog.get("2b0cB").unwrap();
        assert_eq!(third.accession, None);
        assert_eq!(third.cluster_id, None);
    }

    #[test]
    fn test_build_is_deterministic() {
        let (_dir, layout) = prospeccts_fixture();
        let mut bundle = MappingBundle::new("prospeccts", 30);
        bundle.insert("1a0iA", Some("P00918"), Some(4));

        let a = EntryCatalog::build(&layout, Some(&bundle)).unwrap();
        let b = EntryCatalog::build(&layout, Some(&bundle)).unwrap();
        assert_eq!(a.into_entries(), b.into_entries());
    }

    #[test]
    fn test_load_requires_bundle() {
        let (_dir, layout) = prospeccts_fixture();
        match EntryCatalog::load(&layout) {
            Err(PocketBenchError::ResourceNotFound(path)) => {
                assert!(path.ends_with("prospeccts/pdbcode_mappings.json"))
            }
            other => panic!("expected missing bundle, got {:?}", other.map(|c| c.len())),
        }

        let mut bundle = MappingBundle::new("prospeccts", 30);
        bundle.insert("1a0jA", Some("P00918"), None);
        save_bundle(&bundle, &layout.bundle_path()).unwrap();

        let catalog = EntryCatalog::load(&layout).unwrap();
        assert_eq!(
            catalog.get("1a0jA").unwrap().accession.as_deref(),
            Some("P00918")
        );
    }

    #[test]
    fn test_tough_duplicates_keep_first() {
        let dir = TempDir::new().unwrap();
        let tough = dir.path().join("TOUGH-M1");
        fs::create_dir_all(&tough).unwrap();
        fs::write(tough.join("TOUGH-M1_pocket.list"), "1a2bA 1 x\n1a2bA 4 x\n5e6fC 2 x\n")
            .unwrap();

        let layout = DatasetLayout::new(dir.path(), "TOUGH-M1").unwrap();
        let catalog = EntryCatalog::unannotated(&layout).unwrap();

        assert_eq!(catalog.len(), 2);
        let entry = catalog.get("1a2bA").unwrap();
        assert_eq!(entry.pocket_number, Some(1));
        assert!(entry.pocket.ends_with(PathBuf::from("pockets/pocket0_vert.pqr")));
    }
}
