//! Pocket Bench - dataset preparation and evaluation for protein pocket
//! matching benchmarks.
//!
//! Supports TOUGH-M1 and the ProSPECCTs variants. A pocket matcher is
//! judged by how well its pair scores separate pockets binding similar
//! ligands from pockets that do not.
//!
//! # Overview
//!
//! 1. A one-time preprocessing pass resolves every structure chain to a
//!    protein-family accession and a sequence-identity cluster, and
//!    persists the result as a mapping bundle
//! 2. The entry catalog enumerates a dataset's structures and annotates
//!    them from the bundle
//! 3. Labeled pairs are built by joining the dataset's pair listing
//!    against the catalog
//! 4. The evaluator scores all pairs with one matcher call and computes
//!    ROC AUC and VOC average precision
//!
//! # Quick Start
//!
//! ```no_run
//! use pocket_bench::{
//!     config::Config,
//!     dataset::{DatasetLayout, EntryCatalog, PairSetBuilder},
//!     eval::{MatchEvaluator, ScoreFileMatcher},
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let layout = DatasetLayout::new(&config.data.structure_data_dir, "P1")?;
//!     let catalog = EntryCatalog::load(&layout)?;
//!     let pairs = PairSetBuilder::build(&catalog, &layout.pair_listing())?;
//!
//!     let matcher = ScoreFileMatcher::from_file(Path::new("scores.csv"))?;
//!     let result = MatchEvaluator::new().evaluate(&pairs, &matcher)?;
//!     println!("AUC {:.3}, AP {:.3}", result.auc, result.average_precision);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **IdentityClusterIndex**: chain to sequence-cluster map from RCSB cluster files
//! - **AccessionResolver**: best-effort chain to UniProt accession lookup
//! - **EntryCatalog**: the canonical entries of one dataset variant
//! - **PairSetBuilder**: labeled pairs joined against a catalog
//! - **MatchEvaluator**: ROC/PR metrics over a matcher's scores

pub mod accession;
pub mod clusters;
pub mod config;
pub mod dataset;
pub mod entry;
pub mod error;
pub mod eval;
pub mod persistence;
pub mod services;

// Re-export commonly used types
pub use accession::AccessionResolver;
pub use clusters::{ClusterFileSource, ClusterId, IdentityClusterIndex};
pub use config::Config;
pub use dataset::{DatasetLayout, EntryCatalog, PairSet, PairSetBuilder, Preprocessor};
pub use entry::{Entry, EntryPair};
pub use error::{PocketBenchError, Result};
pub use eval::{EvaluationResult, MatchEvaluator, PocketMatcher, ScoreFileMatcher};
pub use persistence::{MappingBundle, load_bundle, save_bundle};
pub use services::{LookupCache, PdbeClient, Supersession};
