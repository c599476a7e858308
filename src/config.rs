//! Configuration for the benchmark pipeline.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{PocketBenchError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Identity thresholds for which RCSB publishes cluster-definition files.
pub const SUPPORTED_IDENTITIES: [u32; 7] = [30, 40, 50, 70, 90, 95, 100];

/// Where the benchmark data lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory holding `TOUGH-M1/`, `prospeccts/` and cluster files.
    pub structure_data_dir: PathBuf,

    /// Sequence identity (percent) of the cluster definition to use.
    #[serde(default = "default_identity")]
    pub identity_threshold: u32,
}

fn default_identity() -> u32 {
    30
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            structure_data_dir: PathBuf::new(),
            identity_threshold: default_identity(),
        }
    }
}

/// Remote bioinformatics services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the PDBe REST API.
    #[serde(default = "default_pdbe_api_base")]
    pub pdbe_api_base: String,

    /// Base URL the `bc-{identity}.out` cluster files are downloaded from.
    #[serde(default = "default_cluster_download_base")]
    pub cluster_download_base: String,

    /// Per-request timeout. `None` keeps the HTTP client's default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Maximum number of obsolete-status answers kept in memory.
    #[serde(default = "default_status_cache_capacity")]
    pub status_cache_capacity: usize,
}

fn default_pdbe_api_base() -> String {
    "https://www.ebi.ac.uk/pdbe/api".to_string()
}

fn default_cluster_download_base() -> String {
    "https://cdn.rcsb.org/resources/sequence/clusters".to_string()
}

fn default_status_cache_capacity() -> usize {
    4096
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pdbe_api_base: default_pdbe_api_base(),
            cluster_download_base: default_cluster_download_base(),
            request_timeout_secs: None,
            status_cache_capacity: default_status_cache_capacity(),
        }
    }
}

/// Batch preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreprocessConfig {
    /// Number of concurrent workers. `None` uses the available cores.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl PreprocessConfig {
    /// Worker count actually used.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub services: ServiceConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    data: Option<DataFileSection>,
    services: Option<ServicesFileSection>,
    preprocess: Option<PreprocessFileSection>,
}

#[derive(Debug, Deserialize)]
struct DataFileSection {
    structure_data_dir: Option<PathBuf>,
    identity_threshold: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ServicesFileSection {
    pdbe_api_base: Option<String>,
    cluster_download_base: Option<String>,
    request_timeout_secs: Option<u64>,
    status_cache_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PreprocessFileSection {
    workers: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (STRUCTURE_DATA_DIR, POCKET_BENCH_IDENTITY, ...)
    /// 2. Config file (~/.config/pocket-bench/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("STRUCTURE_DATA_DIR") {
            self.data.structure_data_dir = PathBuf::from(dir);
        }

        if let Some(identity) = var("POCKET_BENCH_IDENTITY") {
            if let Ok(identity) = identity.parse() {
                self.data.identity_threshold = identity;
            }
        }

        if let Some(base) = var("PDBE_API_BASE") {
            self.services.pdbe_api_base = base;
        }

        if let Some(base) = var("RCSB_CLUSTER_BASE") {
            self.services.cluster_download_base = base;
        }

        if let Some(workers) = var("POCKET_BENCH_WORKERS") {
            if let Ok(workers) = workers.parse() {
                self.preprocess.workers = Some(workers);
            }
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PocketBenchError::io(path, e))?;
        Self::from_yaml(&content)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content).map_err(|e| {
            PocketBenchError::Config(format!("Failed to parse config file: {}", e))
        })?;

        let mut config = Config::default();

        if let Some(data) = file_config.data {
            if let Some(dir) = data.structure_data_dir {
                config.data.structure_data_dir = dir;
            }
            if let Some(identity) = data.identity_threshold {
                config.data.identity_threshold = identity;
            }
        }

        if let Some(services) = file_config.services {
            if let Some(base) = services.pdbe_api_base {
                config.services.pdbe_api_base = base;
            }
            if let Some(base) = services.cluster_download_base {
                config.services.cluster_download_base = base;
            }
            if services.request_timeout_secs.is_some() {
                config.services.request_timeout_secs = services.request_timeout_secs;
            }
            if let Some(capacity) = services.status_cache_capacity {
                config.services.status_cache_capacity = capacity;
            }
        }

        if let Some(preprocess) = file_config.preprocess {
            config.preprocess.workers = preprocess.workers;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pocket-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.data.structure_data_dir.as_os_str().is_empty() {
            return Err(PocketBenchError::Config(
                "Structure data directory is required. Set STRUCTURE_DATA_DIR environment variable or add to config file.".to_string()
            ));
        }

        if !SUPPORTED_IDENTITIES.contains(&self.data.identity_threshold) {
            return Err(PocketBenchError::Config(format!(
                "Unsupported identity threshold {}; expected one of {:?}",
                self.data.identity_threshold, SUPPORTED_IDENTITIES
            )));
        }

        if self.services.status_cache_capacity == 0 {
            return Err(PocketBenchError::Config(
                "status_cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.preprocess.workers == Some(0) {
            return Err(PocketBenchError::Config(
                "preprocess.workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config rooted at an explicit data directory (useful for testing).
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data: DataConfig {
                structure_data_dir: dir.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
