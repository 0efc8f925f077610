use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crawler::config::{CrawlerConfig, USER_AGENT};
use crawler::engine::{load_seeds, Crawler};

/// A polite, concurrent web crawler that writes fetched pages to a rotating
/// gzip WARC corpus.
#[derive(Parser, Debug)]
#[command(name = "simple-crawler")]
struct Args {
    /// Seed file: one URL per line.
    #[arg(long)]
    seeds: PathBuf,

    /// Directory the WARC corpus is written into.
    #[arg(long, default_value = "corpus")]
    corpus: PathBuf,

    /// Page budget for the run.
    #[arg(long, default_value_t = 1000)]
    number: usize,

    /// Max in-flight requests process-wide.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Max in-flight requests per domain.
    #[arg(long, default_value_t = 2)]
    domain_concurrency: usize,

    /// Fallback crawl delay (seconds) when robots.txt specifies none.
    #[arg(long, default_value_t = 1.0)]
    craw_delay: f64,

    /// WARC records per file before rotation.
    #[arg(long, default_value_t = 1000)]
    save_interval: usize,

    /// Print a per-page JSON summary.
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Print progress lines as pages are fetched.
    #[arg(long, default_value_t = false)]
    show_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let corpus_dir = args.corpus.clone();

    let config = CrawlerConfig {
        seeds_path: args.seeds.clone(),
        corpus_dir: args.corpus,
        max_page_count: args.number,
        max_concurrency: args.concurrency,
        max_concurrent_requests_per_domain: args.domain_concurrency,
        crawl_delay: Duration::from_secs_f64(args.craw_delay),
        save_interval: args.save_interval,
        debug: args.debug,
        show_progress: args.show_progress,
        user_agent: USER_AGENT.to_string(),
        fetch_timeout: Duration::from_secs(5),
    };

    let seeds = load_seeds(&args.seeds)?;
    tracing::info!(count = seeds.len(), "loaded seeds");

    let crawler = Arc::new(Crawler::new(config)?);
    let pages = crawler.clone().run(seeds).await?;

    let checkpoint = crawler.checkpoint();
    checkpoint.write(&corpus_dir)?;

    println!("fetched {pages} pages");
    Ok(())
}
