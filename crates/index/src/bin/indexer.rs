use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use index::{Reader, StreamingIndexer};
use serde::Serialize;

/// Builds an inverted index from a JSONL corpus.
#[derive(Parser, Debug)]
#[command(name = "indexer")]
struct Args {
    /// JSONL corpus produced by the crawler's projection step.
    #[arg(long)]
    corpus: PathBuf,

    /// Output directory for the index triple.
    #[arg(long)]
    index: PathBuf,

    /// Memory budget in megabytes before a spill is triggered.
    #[arg(long, default_value_t = 512.0)]
    memory: f64,

    /// Degree of parallelism for batch tokenization.
    #[arg(long, default_value_t = num_cpus::get())]
    workers: usize,
}

#[derive(Serialize)]
struct Stats {
    index_size_mb: f64,
    elapsed_seconds: f64,
    num_lists: usize,
    avg_list_size: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build_global()
        .ok();

    let start = Instant::now();
    let reader = Reader::open(&args.corpus)?;
    let build = StreamingIndexer::new(&args.index, args.memory).build(&reader)?;

    let index_bytes: u64 = std::fs::read_dir(&args.index)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum();

    let stats = Stats {
        index_size_mb: index_bytes as f64 / (1024.0 * 1024.0),
        elapsed_seconds: start.elapsed().as_secs_f64(),
        num_lists: build.terms,
        avg_list_size: if build.terms > 0 {
            build.total_postings as f64 / build.terms as f64
        } else {
            0.0
        },
    };

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
