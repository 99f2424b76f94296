//! `cendex-cli`: loads an `fvecs` base set, builds a [`cendex::Tree`] over
//! it, issues `search` for every query in an `fvecs`/`ivecs` query and
//! groundtruth pair, and reports recall@k alongside basic tree stats.
//!
//! This binary is the only place in the crate that installs a global
//! `tracing` subscriber; the library itself never does (see `DESIGN.md`).
//! Verbosity is controlled through `RUST_LOG`, e.g. `RUST_LOG=debug
//! cendex-cli ...`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use cendex::formats::{FvecsReader, IvecsReader};
use cendex::{Tree, TreeConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Build a cendex tree over an `fvecs` base set and measure recall@k
/// against a query/groundtruth pair.
#[derive(Parser, Debug)]
#[command(name = "cendex-cli", version, about)]
struct Args {
    /// Path to the `fvecs` file of base vectors to index.
    #[arg(long)]
    base: PathBuf,

    /// Path to the `fvecs` file of query vectors.
    #[arg(long)]
    queries: PathBuf,

    /// Path to the `ivecs` file of groundtruth neighbor ids, one row per
    /// query, ordered nearest-first.
    #[arg(long)]
    groundtruth: PathBuf,

    /// Number of neighbors to request per query.
    #[arg(long, default_value_t = 10)]
    k: usize,

    /// Maximum number of centroids per node (fan-out `C`).
    #[arg(long, default_value_t = 128)]
    max_centroids: u32,

    /// Maximum number of vectors per cluster (capacity `M`).
    #[arg(long, default_value_t = 8)]
    max_vectors: u32,

    /// Beam width used while descending to find the insertion leaf.
    #[arg(long, default_value_t = 400)]
    insert_beam_width: usize,

    /// Beam width used while answering search queries.
    #[arg(long, default_value_t = 128)]
    query_beam_width: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let base = FvecsReader::open(&args.base)?;
    let dim = base.dim();
    tracing::info!(dim, "loaded base set header");

    let config = TreeConfig::new(dim)
        .max_centroids(args.max_centroids)
        .max_vectors(args.max_vectors)
        .insert_beam_width(args.insert_beam_width)
        .query_beam_width(args.query_beam_width);
    let mut tree = Tree::new(config);

    let build_start = Instant::now();
    for row in base {
        tree.insert(&row?)?;
    }
    tracing::info!(
        n = tree.len(),
        elapsed = ?build_start.elapsed(),
        depth = tree.depth(),
        num_nodes = tree.num_nodes(),
        num_leaf_nodes = tree.num_leaf_nodes(),
        "built tree"
    );

    let queries: Vec<Vec<f32>> = FvecsReader::open(&args.queries)?.collect::<Result<_, _>>()?;
    let groundtruth: Vec<Vec<i32>> = IvecsReader::open(&args.groundtruth)?.collect::<Result<_, _>>()?;
    anyhow::ensure!(
        queries.len() == groundtruth.len(),
        "query count ({}) does not match groundtruth count ({})",
        queries.len(),
        groundtruth.len()
    );

    let search_start = Instant::now();
    let mut hits = 0usize;
    let mut total = 0usize;
    for (query, truth) in queries.iter().zip(&groundtruth) {
        let expected: HashSet<u32> = truth.iter().take(args.k).map(|&id| id as u32).collect();
        let found = tree.search(query, args.k)?;
        hits += found.iter().filter(|(id, _)| expected.contains(id)).count();
        total += expected.len();
    }
    let recall = hits as f64 / total.max(1) as f64;

    println!("built tree over {} vectors (dim={dim})", tree.len());
    println!("depth={} num_nodes={} num_leaf_nodes={}", tree.depth(), tree.num_nodes(), tree.num_leaf_nodes());
    println!(
        "recall@{} = {:.4} over {} queries ({:?})",
        args.k,
        recall,
        queries.len(),
        search_start.elapsed()
    );

    Ok(())
}
