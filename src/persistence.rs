//! Persistence layer for mapping bundles.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.
//! A bundle is produced once per dataset family by preprocessing and read on
//! every later catalog load. It is never invalidated automatically: it must
//! be regenerated whenever the cluster-definition file behind it changes.

use crate::clusters::ClusterId;
use crate::entry::UNKNOWN;
use crate::error::{PocketBenchError, Result};
use bincode::{Decode, Encode};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default filename for the mapping bundle.
pub const DEFAULT_BUNDLE_FILENAME: &str = "pdbcode_mappings.json";

/// Per-structure accession and cluster annotations.
///
/// Values are stored as text, `"unknown"` marking an unresolved lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MappingBundle {
    /// Dataset family the bundle was built for.
    pub dataset: String,
    /// Identity threshold of the cluster file used.
    pub identity_threshold: u32,
    pub code5_to_accession: BTreeMap<String, String>,
    pub code5_to_cluster: BTreeMap<String, String>,
}

impl MappingBundle {
    pub fn new(dataset: impl Into<String>, identity_threshold: u32) -> Self {
        Self {
            dataset: dataset.into(),
            identity_threshold,
            ..Default::default()
        }
    }

    /// Record the annotations of one structure, replacing earlier ones.
    pub fn insert(&mut self, code5: &str, accession: Option<&str>, cluster: Option<ClusterId>) {
        self.code5_to_accession
            .insert(code5.to_string(), accession.unwrap_or(UNKNOWN).to_string());
        self.code5_to_cluster.insert(
            code5.to_string(),
            cluster
                .map(|c| c.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        );
    }

    pub fn contains(&self, code5: &str) -> bool {
        self.code5_to_accession.contains_key(code5) || self.code5_to_cluster.contains_key(code5)
    }

    pub fn len(&self) -> usize {
        self.code5_to_accession.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code5_to_accession.is_empty() && self.code5_to_cluster.is_empty()
    }

    pub fn accession(&self, code5: &str) -> Option<String> {
        self.code5_to_accession
            .get(code5)
            .filter(|v| v.as_str() != UNKNOWN)
            .cloned()
    }

    pub fn cluster(&self, code5: &str) -> Option<ClusterId> {
        let value = self.code5_to_cluster.get(code5)?;
        if value == UNKNOWN {
            return None;
        }
        match value.parse() {
            Ok(cluster) => Some(cluster),
            Err(_) => {
                warn!("Ignoring malformed cluster id '{}' for {}", value, code5);
                None
            }
        }
    }

    /// Structures without a cluster assignment.
    pub fn unclustered(&self) -> Vec<&str> {
        self.code5_to_cluster
            .iter()
            .filter(|(_, v)| v.as_str() == UNKNOWN)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Inverse view: accession to the structures mapped to it.
    pub fn codes_by_accession(&self) -> BTreeMap<String, Vec<String>> {
        let mut inverse: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (code5, accession) in &self.code5_to_accession {
            if accession != UNKNOWN {
                inverse.entry(accession.clone()).or_default().push(code5.clone());
            }
        }
        inverse
    }
}

/// Save format for mapping bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json, // Default to JSON
        }
    }
}

/// Save a bundle, overwriting any previous one.
pub fn save_bundle(bundle: &MappingBundle, path: &Path) -> Result<()> {
    let format = SaveFormat::from_path(path);
    save_bundle_with_format(bundle, path, format)
}

/// Save a bundle with specific format.
pub fn save_bundle_with_format(
    bundle: &MappingBundle,
    path: &Path,
    format: SaveFormat,
) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| PocketBenchError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(bundle)
            .map_err(|e| PocketBenchError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(bundle, config)
                .map_err(|e| PocketBenchError::Serialization(e.to_string()))?
        }
    };

    fs::write(path, &data).map_err(|e| PocketBenchError::io(path, e))?;

    Ok(())
}

/// Load a bundle; a missing file is a `ResourceNotFound` error.
pub fn load_bundle(path: &Path) -> Result<MappingBundle> {
    if !path.exists() {
        return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
    }

    let format = SaveFormat::from_path(path);
    load_bundle_with_format(path, format)
}

/// Load a bundle with specific format.
pub fn load_bundle_with_format(path: &Path, format: SaveFormat) -> Result<MappingBundle> {
    let data = fs::read(path).map_err(|e| PocketBenchError::io(path, e))?;

    let bundle = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| PocketBenchError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (bundle, _): (MappingBundle, usize) = bincode::decode_from_slice(&data, config)
                .map_err(|e| PocketBenchError::Serialization(e.to_string()))?;
            bundle
        }
    };

    Ok(bundle)
}

/// Check if a bundle file exists at the given path.
pub fn bundle_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_bundle() -> MappingBundle {
        let mut bundle = MappingBundle::new("TOUGH-M1", 30);
        bundle.insert("1atpE", Some("P05132"), Some(0));
        bundle.insert("2cpkE", Some("P05132"), Some(0));
        bundle.insert("4hhbA", None, Some(17));
        bundle.insert("9xyzB", None, None);
        bundle
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_BUNDLE_FILENAME);

        let original = create_test_bundle();
        save_bundle(&original, &path).unwrap();
        assert!(bundle_exists(&path));

        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.bin");

        let original = create_test_bundle();
        save_bundle(&original, &path).unwrap();

        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.identity_threshold, 30);
        assert_eq!(loaded.cluster("4hhbA"), Some(17));
    }

    #[test]
    fn test_rerun_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_BUNDLE_FILENAME);

        save_bundle(&create_test_bundle(), &path).unwrap();
        let mut second = MappingBundle::new("TOUGH-M1", 30);
        second.insert("1atpE", Some("P05132"), Some(3));
        save_bundle(&second, &path).unwrap();

        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.cluster("1atpE"), Some(3));
    }

    #[test]
    fn test_unknown_values() {
        let bundle = create_test_bundle();
        assert_eq!(bundle.accession("4hhbA"), None);
        assert_eq!(bundle.cluster("9xyzB"), None);
        assert!(bundle.contains("9xyzB"));
        assert!(!bundle.contains("0000A"));
        assert_eq!(bundle.code5_to_cluster["9xyzB"], "unknown");
        assert_eq!(bundle.unclustered(), vec!["9xyzB"]);
    }

    #[test]
    fn test_malformed_cluster_is_unknown() {
        let mut bundle = MappingBundle::new("P1", 30);
        bundle
            .code5_to_cluster
            .insert("1abcA".to_string(), "None".to_string());
        assert_eq!(bundle.cluster("1abcA"), None);
    }

    #[test]
    fn test_codes_by_accession() {
        let inverse = create_test_bundle().codes_by_accession();
        assert_eq!(inverse.len(), 1);
        assert_eq!(inverse["P05132"], vec!["1atpE", "2cpkE"]);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_bundle(Path::new("/nonexistent/pdbcode_mappings.json"));
        assert!(matches!(result, Err(PocketBenchError::ResourceNotFound(_))));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("m.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("m.bin")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("m.bincode")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("m")), SaveFormat::Json);
    }
}
