use std::path::PathBuf;
use std::time::Duration;

pub const USER_AGENT: &str = "SimpleCrawler/1.0.0";

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub seeds_path: PathBuf,
    pub corpus_dir: PathBuf,
    pub max_page_count: usize,
    pub max_concurrency: usize,
    pub max_concurrent_requests_per_domain: usize,
    pub crawl_delay: Duration,
    pub save_interval: usize,
    pub debug: bool,
    pub show_progress: bool,
    pub user_agent: String,
    pub fetch_timeout: Duration,
}

impl CrawlerConfig {
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            seeds_path: PathBuf::from("seeds.txt"),
            corpus_dir: std::env::temp_dir().join("crawler-test-corpus"),
            max_page_count: 10,
            max_concurrency: 2,
            max_concurrent_requests_per_domain: 1,
            crawl_delay: Duration::from_millis(0),
            save_interval: 100,
            debug: false,
            show_progress: false,
            user_agent: USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}
