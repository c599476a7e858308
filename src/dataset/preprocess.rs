//! One-time batch resolution of accessions and clusters.
//!
//! Every raw structure of a dataset family is resolved independently by a
//! worker task; results are keyed by `code5` and merged into a single
//! [`MappingBundle`] once all workers are done. A failing or panicking
//! worker only costs its own structure, which is recorded as unknown.
//! Rerunning overwrites the previous bundle.

use super::layout::{DatasetLayout, Family};
use crate::accession::AccessionResolver;
use crate::clusters::{ClusterId, IdentityClusterIndex};
use crate::entry::Entry;
use crate::error::{PocketBenchError, Result};
use crate::persistence::{MappingBundle, save_bundle};
use crate::services::{ExperimentLookup, StructureService, Supersession};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

/// ProSPECCTs files under this directory carry truncated NMR entry ids.
const NMR_DIR: &str = "NMR_structures";

/// Suffixes of derived files that are not raw structures.
const DERIVED_MARKERS: [&str; 3] = ["_site", "_lig", "_clean"];

/// A structure to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStructure {
    pub code5: String,
    /// Source PDB file (ProSPECCTs only).
    pub source: Option<PathBuf>,
}

/// Worker output for one structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureAnnotation {
    pub accession: Option<String>,
    pub cluster: Option<ClusterId>,
}

/// Shared, read-only state every worker gets a handle to.
struct WorkerContext<S> {
    family: Family,
    service: Arc<S>,
    clusters: Arc<IdentityClusterIndex<S>>,
    supersession: Supersession<S>,
    accessions: AccessionResolver<S>,
}

impl<S> Clone for WorkerContext<S> {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            service: Arc::clone(&self.service),
            clusters: Arc::clone(&self.clusters),
            supersession: self.supersession.clone(),
            accessions: self.accessions.clone(),
        }
    }
}

/// Builds and persists the mapping bundle of a dataset family.
pub struct Preprocessor<S> {
    layout: DatasetLayout,
    context: WorkerContext<S>,
    workers: usize,
}

impl<S: StructureService> Preprocessor<S> {
    pub fn new(
        layout: DatasetLayout,
        service: Arc<S>,
        clusters: Arc<IdentityClusterIndex<S>>,
        supersession: Supersession<S>,
        workers: usize,
    ) -> Self {
        Self {
            context: WorkerContext {
                family: layout.family(),
                accessions: AccessionResolver::new(Arc::clone(&service)),
                service,
                clusters,
                supersession,
            },
            layout,
            workers: workers.max(1),
        }
    }

    /// All raw structures of the family, in a stable order.
    pub fn raw_structures(&self) -> Result<Vec<RawStructure>> {
        match self.layout.family() {
            Family::ToughM1 => Ok(self
                .layout
                .read_listed_structures()?
                .into_iter()
                .map(|s| RawStructure {
                    code5: s.code5,
                    source: None,
                })
                .collect()),
            Family::Prospeccts => scan_prospeccts(&self.layout.family_dir()),
        }
    }

    /// Resolve every raw structure concurrently and collect the bundle.
    pub async fn run(&self) -> Result<MappingBundle> {
        let structures = self.raw_structures()?;
        info!(
            "Preprocessing {}: resolving accessions and clusters for {} structures with {} workers, this will take time.",
            self.layout.family().dir_name(),
            structures.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(structures.len());
        for structure in structures {
            let context = self.context.clone();
            let semaphore = Arc::clone(&semaphore);
            let code5 = structure.code5.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PocketBenchError::Lookup(e.to_string()))?;
                context.resolve(structure).await
            });
            handles.push((code5, handle));
        }

        let mut bundle = MappingBundle::new(
            self.layout.family().dir_name(),
            self.context.clusters.identity(),
        );
        for (code5, handle) in handles {
            let annotation = match handle.await {
                Ok(Ok(annotation)) => annotation,
                Ok(Err(e)) => {
                    warn!("Preprocessing {} failed: {}", code5, e);
                    StructureAnnotation::default()
                }
                Err(e) => {
                    warn!("Worker for {} aborted: {}", code5, e);
                    StructureAnnotation::default()
                }
            };
            bundle.insert(&code5, annotation.accession.as_deref(), annotation.cluster);
        }

        let unclustered = bundle.unclustered();
        if !unclustered.is_empty() {
            info!(
                "Unable to get clusters for {} entries: {:?}",
                unclustered.len(),
                unclustered
            );
        }

        Ok(bundle)
    }

    /// Run and persist the bundle where catalog loads will look for it.
    pub async fn preprocess_once(&self) -> Result<MappingBundle> {
        let bundle = self.run().await?;
        let path = self.layout.bundle_path();
        save_bundle(&bundle, &path)?;
        info!("Mapping bundle written to {}", path.display());
        Ok(bundle)
    }
}

impl<S: StructureService> WorkerContext<S> {
    async fn resolve(self, structure: RawStructure) -> Result<StructureAnnotation> {
        match self.family {
            Family::ToughM1 => Ok(self.resolve_tough(&structure.code5).await),
            Family::Prospeccts => self.resolve_prospeccts(&structure).await,
        }
    }

    /// The chain letter is assumed unchanged when an entry was superseded.
    async fn resolve_tough(&self, code5: &str) -> StructureAnnotation {
        let listed_code = Entry::code_of(code5).to_lowercase();
        let chain: String = code5.chars().skip(4).take(1).collect();

        let code = self
            .supersession
            .superseded_by(&listed_code)
            .await
            .unwrap_or(listed_code);

        StructureAnnotation {
            accession: self.accessions.resolve(&code, &chain).await,
            cluster: self.clusters.get_cluster(&code, &chain, true).await,
        }
    }

    async fn resolve_prospeccts(&self, structure: &RawStructure) -> Result<StructureAnnotation> {
        let stem = &structure.code5;
        let chain: String = stem.chars().skip(4).take(1).collect::<String>().to_uppercase();
        let mut code = Entry::code_of(stem).to_lowercase();

        if let Some(source) = &structure.source {
            if source.components().any(|c| c.as_os_str() == NMR_DIR) {
                code = match recover_nmr_code(self.service.as_ref(), source, stem).await? {
                    Some(full_code) => full_code,
                    None => {
                        warn!("Could not recover the PDB id of NMR structure {}", stem);
                        return Ok(StructureAnnotation::default());
                    }
                };
            }
        }

        let cluster = if chain.is_empty() {
            self.clusters.get_cluster_any_chain(&code).await
        } else {
            self.clusters.get_cluster(&code, &chain, true).await
        };

        Ok(StructureAnnotation {
            accession: self.accessions.resolve(&code, &chain).await,
            cluster,
        })
    }
}

/// Raw ProSPECCTs structures below `root`, one per `code5`.
fn scan_prospeccts(root: &Path) -> Result<Vec<RawStructure>> {
    if !root.exists() {
        return Err(PocketBenchError::ResourceNotFound(root.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PocketBenchError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        let is_pdb = path.extension().is_some_and(|ext| ext == "pdb");
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file()
            && is_pdb
            && !DERIVED_MARKERS.iter().any(|marker| name.contains(marker))
        {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut structures = Vec::new();
    for path in paths {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if stem.contains('_') || stem.chars().count() < 4 {
            debug!("Skipping {}", path.display());
            continue;
        }
        if seen.insert(stem.clone()) {
            structures.push(RawStructure {
                code5: stem,
                source: Some(path),
            });
        } else {
            debug!("{} already queued, skipping {}", stem, path.display());
        }
    }
    Ok(structures)
}

/// Recover the full id of an NMR entry whose file name is truncated
/// (e.g. `cz00A` for 1cz2).
///
/// Tokens of the file containing the first two characters of the stem
/// are tried as id prefixes; the first one the service reports as an NMR
/// experiment wins.
async fn recover_nmr_code<E: ExperimentLookup>(
    service: &E,
    source: &Path,
    stem: &str,
) -> Result<Option<String>> {
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| PocketBenchError::io(source, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let needle: String = stem.chars().take(2).collect::<String>().to_lowercase();
    info!("Searching for PDB id of {} using string: {}", stem, needle);

    let mut tried = HashSet::new();
    for token in text.lines().flat_map(str::split_whitespace) {
        let token = token.to_lowercase();
        if !token.contains(&needle) || token.chars().count() < 4 {
            continue;
        }
        let candidate = Entry::code_of(&token);
        if !tried.insert(candidate.clone()) {
            continue;
        }

        debug!("Checking whether {} is an NMR entry", candidate);
        match service.experimental_methods(&candidate).await {
            Ok(methods) if methods.iter().any(|m| m.contains("NMR")) => {
                return Ok(Some(candidate));
            }
            Ok(_) => {}
            Err(e) => debug!("No experiment record for {}: {}", candidate, e),
        }
    }
    Ok(None)
}
