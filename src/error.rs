//! Error types for the benchmark pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, PocketBenchError>;

/// Errors that can occur while preparing or evaluating a benchmark.
#[derive(Error, Debug)]
pub enum PocketBenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A local resource the caller should have prepared is missing.
    #[error("Required resource not found at '{0}'")]
    ResourceNotFound(PathBuf),

    /// A listing line does not have the columns its convention requires.
    #[error("Invalid listing line {line} in '{path}': {reason}")]
    InvalidListing {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Dataset tag not in the fixed variant table.
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    /// Not enough valid scores/labels to compute ranking metrics.
    #[error("Insufficient data for metrics: {0}")]
    InsufficientData(String),

    /// The matcher returned a different number of scores than pairs.
    #[error("Matcher returned {actual} scores for {expected} pairs")]
    ScoreCountMismatch { expected: usize, actual: usize },

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A remote lookup answered with something we could not interpret.
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// Train/test split parameters that cannot be honored.
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PocketBenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a listing error for a 0-indexed line number.
    pub fn listing(path: impl Into<PathBuf>, line_idx: usize, reason: impl Into<String>) -> Self {
        Self::InvalidListing {
            path: path.into(),
            line: line_idx + 1,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for PocketBenchError {
    fn from(err: reqwest::Error) -> Self {
        PocketBenchError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for PocketBenchError {
    fn from(err: serde_json::Error) -> Self {
        PocketBenchError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for PocketBenchError {
    fn from(err: csv::Error) -> Self {
        PocketBenchError::Serialization(err.to_string())
    }
}
