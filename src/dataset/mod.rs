//! Benchmark dataset handling.
//!
//! This module provides:
//! - Fixed path conventions of TOUGH-M1 and the ProSPECCTs variants
//! - The entry catalog and its persisted annotations
//! - Labeled pair construction
//! - One-time accession/cluster preprocessing
//! - Train/test splits

mod catalog;
mod layout;
mod pairs;
mod preprocess;
mod splits;

pub use catalog::EntryCatalog;
pub use layout::{
    CONVENTIONS, DatasetLayout, EntryPaths, Family, ListedStructure, PairListing, PathConvention,
    convention,
};
pub use pairs::{POSITIVE_TOKEN, PairSet, PairSetBuilder};
pub use preprocess::{Preprocessor, RawStructure, StructureAnnotation};
pub use splits::{Split, SplitStrategy, split_entries};
