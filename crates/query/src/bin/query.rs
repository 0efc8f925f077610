use std::path::PathBuf;

use clap::Parser;
use query::{process_query, Index, Ranker};

/// Runs a batch of queries against a built index and prints ranked results.
#[derive(Parser, Debug)]
#[command(name = "query-processor")]
struct Args {
    /// Text file, one query per line; blank lines ignored.
    #[arg(long)]
    queries: PathBuf,

    /// Directory holding the index triple.
    #[arg(long)]
    index: PathBuf,

    /// Scoring function.
    #[arg(long, value_enum, default_value_t = Ranker::Bm25)]
    ranker: Ranker,

    /// Max results per query.
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let index = Index::open(&args.index)?;
    let queries = std::fs::read_to_string(&args.queries)?;

    for line in queries.lines() {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        let result = process_query(&index, query, args.ranker, args.top);
        println!("{}", serde_json::to_string(&result)?);
    }

    Ok(())
}
