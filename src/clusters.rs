//! Sequence-identity cluster index.
//!
//! RCSB publishes one cluster-definition file per identity threshold
//! (`bc-{identity}.out`): one cluster per line, whitespace-separated
//! `CODE_CHAIN` members, the 0-indexed line number being the cluster id.
//! The file is downloaded once into the data directory and read from
//! there afterwards. Cluster ordering changes between releases, so any
//! mapping bundle built against an older file must be regenerated by hand.

use crate::config::Config;
use crate::error::{PocketBenchError, Result};
use crate::services::{ObsoleteLookup, Supersession};
use log::{debug, info, warn};
use reqwest::Client;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cluster id: the line number in the cluster-definition file.
pub type ClusterId = usize;

/// Index key for a structure chain, e.g. `1ATP_E`.
pub fn cluster_key(code: &str, chain: &str) -> String {
    format!("{}_{}", code.to_uppercase(), chain.to_uppercase())
}

/// Local cache of cluster-definition files with download on miss.
#[derive(Clone)]
pub struct ClusterFileSource {
    cache_dir: PathBuf,
    download_base: String,
    client: Client,
}

impl ClusterFileSource {
    pub fn new(cache_dir: impl Into<PathBuf>, download_base: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            download_base: download_base.into(),
            client: Client::new(),
        }
    }

    /// Cache into the structure data directory, download from the configured base.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.services.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            cache_dir: config.data.structure_data_dir.clone(),
            download_base: config.services.cluster_download_base.clone(),
            client: builder.build()?,
        })
    }

    pub fn cache_path(&self, identity: u32) -> PathBuf {
        self.cache_dir.join(format!("bc-{}.out", identity))
    }

    fn download_url(&self, identity: u32) -> String {
        let base = self.download_base.trim_end_matches('/');
        format!("{}/bc-{}.out", base, identity)
    }

    /// Path of the cluster file for `identity`, downloading it if not cached.
    pub async fn fetch(&self, identity: u32) -> Result<PathBuf> {
        let path = self.cache_path(identity);
        info!("Cluster file path: {}", path.display());

        if path.exists() {
            return Ok(path);
        }

        warn!("Cluster definition not found, downloading a fresh one.");
        warn!(
            "A fresh cluster file will likely disagree with existing mapping bundles; remove and regenerate them."
        );

        fs::create_dir_all(&self.cache_dir).map_err(|e| PocketBenchError::io(&self.cache_dir, e))?;

        let url = self.download_url(identity);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PocketBenchError::Http(format!(
                "Cluster download from {} failed ({})",
                url,
                response.status()
            )));
        }
        let content = response.bytes().await?;

        // A partial download must never be taken for the cached file.
        let partial = path.with_extension("out.partial");
        fs::write(&partial, &content).map_err(|e| PocketBenchError::io(&partial, e))?;
        fs::rename(&partial, &path).map_err(|e| PocketBenchError::io(&path, e))?;

        Ok(path)
    }
}

/// Chain-to-cluster map for one identity threshold. Immutable after load.
pub struct IdentityClusterIndex<O> {
    identity: u32,
    clusters: HashMap<String, ClusterId>,
    supersession: Supersession<O>,
}

impl<O: ObsoleteLookup> IdentityClusterIndex<O> {
    /// Fetch (or reuse) the cluster file for `identity` and index it.
    pub async fn load(
        source: &ClusterFileSource,
        identity: u32,
        supersession: Supersession<O>,
    ) -> Result<Self> {
        let path = source.fetch(identity).await?;
        Self::from_file(&path, identity, supersession)
    }

    /// Index an existing cluster-definition file.
    pub fn from_file(path: &Path, identity: u32, supersession: Supersession<O>) -> Result<Self> {
        if !path.exists() {
            return Err(PocketBenchError::ResourceNotFound(path.to_path_buf()));
        }
        let file = fs::File::open(path).map_err(|e| PocketBenchError::io(path, e))?;
        Self::from_reader(BufReader::new(file), identity, supersession)
            .map_err(|e| match e {
                PocketBenchError::Io { source, .. } => PocketBenchError::io(path, source),
                other => other,
            })
    }

    /// Index cluster definitions from any line source.
    pub fn from_reader<R: BufRead>(
        reader: R,
        identity: u32,
        supersession: Supersession<O>,
    ) -> Result<Self> {
        let mut clusters = HashMap::new();
        for (cluster_id, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| PocketBenchError::io("<cluster definitions>", e))?;
            for member in line.split_whitespace() {
                clusters.insert(member.to_string(), cluster_id);
            }
        }
        debug!(
            "Indexed {} chains for {}% identity clusters",
            clusters.len(),
            identity
        );

        Ok(Self {
            identity,
            clusters,
            supersession,
        })
    }

    pub fn identity(&self) -> u32 {
        self.identity
    }

    /// Number of indexed chains.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Direct lookup, no obsolete-entry handling.
    pub fn lookup(&self, code: &str, chain: &str) -> Option<ClusterId> {
        self.clusters.get(&cluster_key(code, chain)).copied()
    }

    /// Cluster of a chain; `None` is the "unknown" answer.
    ///
    /// On a miss with `allow_obsolete_retry`, an obsolete `code` is retried
    /// exactly once under its superseding id with the same chain letter.
    /// Chains renamed during supersession are therefore not found; this is
    /// a known approximation.
    pub async fn get_cluster(
        &self,
        code: &str,
        chain: &str,
        allow_obsolete_retry: bool,
    ) -> Option<ClusterId> {
        if let Some(cluster) = self.lookup(code, chain) {
            return Some(cluster);
        }

        if allow_obsolete_retry {
            if let Some(superseding) = self.supersession.superseded_by(code).await {
                info!(
                    "Assigning cluster for obsolete entry via superseding: {}->{} {}",
                    code, superseding, chain
                );
                let cluster = self.lookup(&superseding, chain);
                if cluster.is_none() {
                    info!("Unable to assign cluster to {}{}", superseding, chain);
                }
                return cluster;
            }
        }

        info!("Unable to assign cluster to {}{}", code, chain);
        None
    }

    /// Cluster of the first chain letter `A..=Z` of `code` found in the index.
    ///
    /// For entries listed without a chain. Obsolete handling is the same
    /// single hop as [`get_cluster`](Self::get_cluster), done once for the
    /// whole chain scan.
    pub async fn get_cluster_any_chain(&self, code: &str) -> Option<ClusterId> {
        let first_chain = |code: &str| {
            ('A'..='Z').find_map(|chain| self.lookup(code, &chain.to_string()))
        };

        if let Some(cluster) = first_chain(code) {
            return Some(cluster);
        }
        if let Some(superseding) = self.supersession.superseded_by(code).await {
            if let Some(cluster) = first_chain(&superseding) {
                return Some(cluster);
            }
        }

        info!("Unable to assign cluster to any chain of {}", code);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeService;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const DEFINITIONS: &str = "1ATP_E 2CPK_E 2XYZ_A\n4HHB_A 4HHB_C\n\n3QQQ_B\n";

    /// Local HTTP server answering every request with `status` and `body`.
    /// Returns the base URL and the number of requests served.
    async fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut request = Vec::<u8>::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{}/clusters", addr), requests)
    }

    fn index_with(service: FakeService) -> (IdentityClusterIndex<FakeService>, Arc<FakeService>) {
        let service = Arc::new(service);
        let supersession = Supersession::with_capacity(Arc::clone(&service), 64);
        let index = IdentityClusterIndex::from_reader(Cursor::new(DEFINITIONS), 30, supersession)
            .unwrap();
        (index, service)
    }

    #[test]
    fn test_line_number_is_cluster_id() {
        let (index, _) = index_with(FakeService::offline());
        assert_eq!(index.len(), 6);
        assert_eq!(index.lookup("1atp", "e"), Some(0));
        assert_eq!(index.lookup("4HHB", "C"), Some(1));
        // Blank line still consumes an id.
        assert_eq!(index.lookup("3qqq", "B"), Some(3));
        assert_eq!(index.lookup("4hhb", "B"), None);
    }

    #[tokio::test]
    async fn test_unknown_chain_without_retry_is_none() {
        let (index, service) = index_with(FakeService::offline());
        assert_eq!(index.get_cluster("9zzz", "A", false).await, None);
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_unknown() {
        let (index, _) = index_with(FakeService::offline().with_unreachable("9zzz"));
        assert_eq!(index.get_cluster("9zzz", "A", true).await, None);
    }

    #[tokio::test]
    async fn test_obsolete_entry_redirects_once() {
        let (index, service) = index_with(FakeService::offline().with_superseded("1abc", "2xyz"));
        assert_eq!(index.get_cluster("1abc", "a", true).await, Some(0));
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redirection_is_single_hop() {
        // 1abc -> 2xyz -> 3qqq; 2XYZ_B is absent, 3QQQ_B is present.
        let service = FakeService::offline()
            .with_superseded("1abc", "2xyz")
            .with_superseded("2xyz", "3qqq");
        let (index, service) = index_with(service);

        assert_eq!(index.get_cluster("1abc", "B", true).await, None);
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_any_chain_lookup() {
        let (index, _) = index_with(FakeService::offline().with_superseded("5old", "4hhb"));
        assert_eq!(index.get_cluster_any_chain("3qqq").await, Some(3));
        assert_eq!(index.get_cluster_any_chain("5old").await, Some(1));
        assert_eq!(index.get_cluster_any_chain("7new").await, None);
    }

    #[test]
    fn test_load_uses_cached_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bc-30.out"), DEFINITIONS).unwrap();

        // The base URL is unroutable; a cache hit must not touch it.
        let source = ClusterFileSource::new(dir.path(), "http://127.0.0.1:9/clusters");
        let supersession = Supersession::with_capacity(Arc::new(FakeService::offline()), 8);

        let index = tokio_test::block_on(IdentityClusterIndex::load(&source, 30, supersession))
            .unwrap();
        assert_eq!(index.identity(), 30);
        assert_eq!(index.lookup("2CPK", "E"), Some(0));
    }

    #[test]
    fn test_missing_file_is_resource_not_found() {
        let supersession = Supersession::with_capacity(Arc::new(FakeService::offline()), 8);
        let result = IdentityClusterIndex::from_file(Path::new("/nonexistent/bc-30.out"), 30, supersession);
        assert!(matches!(result, Err(PocketBenchError::ResourceNotFound(_))));
    }

    #[test]
    fn test_download_url() {
        let source = ClusterFileSource::new("/data", "https://cdn.example.org/clusters/");
        assert_eq!(source.download_url(95), "https://cdn.example.org/clusters/bc-95.out");
        assert_eq!(source.cache_path(95), PathBuf::from("/data/bc-95.out"));
    }

    #[tokio::test]
    async fn test_download_on_miss_then_cache_hit() {
        let dir = TempDir::new().unwrap();
        let (base, requests) = serve("200 OK", "1ATP_E 2CPK_E\n4HHB_A\n").await;
        let source = ClusterFileSource::new(dir.path().join("sub"), base);
        let service = Arc::new(FakeService::offline());

        let supersession = Supersession::with_capacity(Arc::clone(&service), 8);
        let index = IdentityClusterIndex::load(&source, 40, supersession).await.unwrap();
        assert_eq!(index.lookup("4hhb", "a"), Some(1));
        assert_eq!(index.lookup("2cpk", "E"), Some(0));
        assert!(source.cache_path(40).exists());
        assert!(!dir.path().join("sub").join("bc-40.out.partial").exists());
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        let supersession = Supersession::with_capacity(service, 8);
        let again = IdentityClusterIndex::load(&source, 40, supersession).await.unwrap();
        assert_eq!(again.lookup("4hhb", "a"), Some(1));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_cache() {
        let dir = TempDir::new().unwrap();
        let (base, requests) = serve("404 Not Found", "missing").await;
        let source = ClusterFileSource::new(dir.path().join("sub"), base);

        let result = source.fetch(40).await;
        assert!(matches!(result, Err(PocketBenchError::Http(_))));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert!(!source.cache_path(40).exists());
        assert!(!dir.path().join("sub").join("bc-40.out.partial").exists());
    }
}
