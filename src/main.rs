//! Pocket Bench CLI
//!
//! Dataset preparation and evaluation for protein pocket matching benchmarks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use pocket_bench::{
    clusters::{ClusterFileSource, IdentityClusterIndex},
    config::Config,
    dataset::{DatasetLayout, EntryCatalog, PairSetBuilder, Preprocessor, SplitStrategy, split_entries},
    eval::{MatchEvaluator, ScoreFileMatcher},
    persistence::bundle_exists,
    services::{PdbeClient, Supersession},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Pocket Bench - protein pocket matching benchmarks (TOUGH-M1, ProSPECCTs)
#[derive(Parser)]
#[command(name = "pocket-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Structure data directory (overrides STRUCTURE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Sequence identity of the cluster definition (overrides POCKET_BENCH_IDENTITY)
    #[arg(long, global = true)]
    identity: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the cluster-definition file if it is not cached yet
    FetchClusters,

    /// Resolve accessions and clusters of a dataset family and save the mapping bundle
    Preprocess {
        /// Dataset tag (TOUGH-M1, P1, P1.2, ..., P7)
        dataset: String,
    },

    /// List the entries of a dataset
    Entries {
        /// Dataset tag
        dataset: String,

        /// Skip the mapping bundle; accession and cluster stay unknown
        #[arg(long)]
        unannotated: bool,

        /// Output as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the labeled pairs of a dataset
    Pairs {
        /// Dataset tag
        dataset: String,

        /// Output the pairs as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate precomputed pair scores against a dataset's labels
    Evaluate {
        /// Dataset tag
        dataset: String,

        /// Score file with `code5_a code5_b score` lines
        #[arg(short, long)]
        scores: PathBuf,

        /// Save the full evaluation result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a train/test split of a dataset
    Splits {
        /// Dataset tag
        dataset: String,

        /// none, pdb-folds, accession-folds or cluster-folds
        #[arg(long, default_value = "cluster-folds")]
        strategy: SplitStrategy,

        /// Number of folds
        #[arg(long, default_value_t = 5)]
        folds: usize,

        /// Fold to return (0-indexed)
        #[arg(long, default_value_t = 0)]
        fold: usize,

        /// Shuffle seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output both sides as JSON lists of code5
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.data_dir, cli.identity)?;

    match cli.command {
        Commands::FetchClusters => cmd_fetch_clusters(&config).await,
        Commands::Preprocess { dataset } => cmd_preprocess(&config, &dataset).await,
        Commands::Entries {
            dataset,
            unannotated,
            json,
        } => cmd_entries(&config, &dataset, unannotated, json),
        Commands::Pairs { dataset, json } => cmd_pairs(&config, &dataset, json),
        Commands::Evaluate {
            dataset,
            scores,
            output,
        } => cmd_evaluate(&config, &dataset, scores, output),
        Commands::Splits {
            dataset,
            strategy,
            folds,
            fold,
            seed,
            json,
        } => cmd_splits(&config, &dataset, strategy, folds, fold, seed, json),
    }
}

fn load_config(data_dir: Option<PathBuf>, identity: Option<u32>) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(dir) = data_dir {
        config.data.structure_data_dir = dir;
    }
    if let Some(identity) = identity {
        config.data.identity_threshold = identity;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Catalog annotated from the bundle when one exists.
fn open_catalog(layout: &DatasetLayout) -> Result<EntryCatalog> {
    if bundle_exists(&layout.bundle_path()) {
        return EntryCatalog::load(layout).context("Failed to load entry catalog");
    }
    warn!(
        "No mapping bundle at {}; run `pocket-bench preprocess {}` to annotate entries",
        layout.bundle_path().display(),
        layout.tag()
    );
    EntryCatalog::unannotated(layout).context("Failed to build entry catalog")
}

async fn cmd_fetch_clusters(config: &Config) -> Result<()> {
    let source = ClusterFileSource::from_config(config)?;
    let identity = config.data.identity_threshold;
    let path = source
        .fetch(identity)
        .await
        .context("Failed to fetch cluster definitions")?;

    println!("Cluster definitions ({}% identity): {}", identity, path.display());
    Ok(())
}

async fn cmd_preprocess(config: &Config, dataset: &str) -> Result<()> {
    let layout = DatasetLayout::new(&config.data.structure_data_dir, dataset)?;
    println!("Preprocessing {}", layout);

    let start = Instant::now();

    let service = Arc::new(PdbeClient::new(&config.services)?);
    let supersession =
        Supersession::with_capacity(Arc::clone(&service), config.services.status_cache_capacity);
    let source = ClusterFileSource::from_config(config)?;
    let clusters = IdentityClusterIndex::load(
        &source,
        config.data.identity_threshold,
        supersession.clone(),
    )
    .await
    .context("Failed to load cluster definitions")?;

    let preprocessor = Preprocessor::new(
        layout.clone(),
        service,
        Arc::new(clusters),
        supersession,
        config.preprocess.effective_workers(),
    );
    let bundle = preprocessor
        .preprocess_once()
        .await
        .context("Preprocessing failed")?;

    println!("\nMapping bundle built:");
    println!("  Structures:   {}", bundle.len());
    println!("  Accessions:   {}", bundle.codes_by_accession().len());
    println!("  Unclustered:  {}", bundle.unclustered().len());
    println!("  Time:         {:.2?}", start.elapsed());
    println!("  Saved to:     {}", layout.bundle_path().display());
    Ok(())
}

fn cmd_entries(config: &Config, dataset: &str, unannotated: bool, json: bool) -> Result<()> {
    let layout = DatasetLayout::new(&config.data.structure_data_dir, dataset)?;
    let catalog = if unannotated {
        EntryCatalog::unannotated(&layout).context("Failed to build entry catalog")?
    } else {
        EntryCatalog::load(&layout).context("Failed to load entry catalog")?
    };

    if json {
        let entries: Vec<_> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<8} {:<12} {:<8} {}", "code5", "accession", "cluster", "pocket");
    println!("{}", "─".repeat(60));
    for entry in catalog.iter() {
        println!(
            "{:<8} {:<12} {:<8} {}",
            entry.code5,
            entry.accession_label(),
            entry.cluster_label(),
            entry.pocket.display()
        );
    }
    println!("{}", "─".repeat(60));
    println!("{} entries in {}", catalog.len(), layout);
    Ok(())
}

fn cmd_pairs(config: &Config, dataset: &str, json: bool) -> Result<()> {
    let layout = DatasetLayout::new(&config.data.structure_data_dir, dataset)?;
    let catalog = open_catalog(&layout)?;
    let pairs = PairSetBuilder::build(&catalog, &layout.pair_listing())
        .context("Failed to build pairs")?;

    if json {
        let rows: Vec<_> = pairs
            .pairs
            .iter()
            .zip(&pairs.labels)
            .map(|(pair, label)| (&pair.first.code5, &pair.second.code5, label))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Pairs of {}", layout);
    println!("  Total:     {}", pairs.len());
    println!("  Positive:  {}", pairs.positives());
    println!("  Negative:  {}", pairs.negatives());
    println!("  Dropped:   {}", pairs.dropped);
    Ok(())
}

fn cmd_evaluate(
    config: &Config,
    dataset: &str,
    scores: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let layout = DatasetLayout::new(&config.data.structure_data_dir, dataset)?;
    let catalog = open_catalog(&layout)?;
    let pairs = PairSetBuilder::build(&catalog, &layout.pair_listing())
        .context("Failed to build pairs")?;

    let matcher = ScoreFileMatcher::from_file(&scores).context("Failed to load scores")?;
    let result = MatchEvaluator::new()
        .evaluate(&pairs, &matcher)
        .context("Evaluation failed")?;

    result.print_summary(layout.tag());

    if let Some(path) = output {
        result.save(&path).context("Failed to save evaluation result")?;
        println!("Result saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_splits(
    config: &Config,
    dataset: &str,
    strategy: SplitStrategy,
    folds: usize,
    fold: usize,
    seed: u64,
    json: bool,
) -> Result<()> {
    let layout = DatasetLayout::new(&config.data.structure_data_dir, dataset)?;
    let catalog = open_catalog(&layout)?;
    let split = split_entries(&catalog, strategy, folds, fold, seed)?;

    if json {
        let codes = |entries: &[pocket_bench::Entry]| -> Vec<String> {
            entries.iter().map(|e| e.code5.clone()).collect()
        };
        let value = serde_json::json!({
            "strategy": strategy.to_string(),
            "fold": fold,
            "folds": folds,
            "seed": seed,
            "train": codes(&split.train),
            "test": codes(&split.test),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Split of {} ({}, fold {} of {}, seed {})", layout, strategy, fold, folds, seed);
    println!("  Train:  {}", split.train.len());
    println!("  Test:   {}", split.test.len());
    Ok(())
}
