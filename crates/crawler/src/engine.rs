//! The crawl loop: a fixed worker pool pulls URLs off the [`Frontier`],
//! fetches them under per-domain politeness, extracts outlinks, and writes
//! completed pages to the WARC corpus until the page budget is spent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use common::Fingerprint;
use dashmap::DashMap;
use frontier::Frontier;
use tokio::sync::Semaphore;
use url::Url;
use warc::CrawlRecord;

use crate::config::CrawlerConfig;
use crate::domain::{host_of, DomainController};
use crate::error::{Error, Result};
use crate::html;
use crate::warc_writer::CorpusWriter;

pub struct Crawler {
    config: CrawlerConfig,
    client: reqwest::Client,
    frontier: Arc<Frontier>,
    domains: DashMap<String, Arc<DomainController>>,
    visited: DashMap<Fingerprint, ()>,
    corpus: Arc<CorpusWriter>,
    global_permits: Arc<Semaphore>,
    pages_written: AtomicUsize,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .build()?;

        let corpus = CorpusWriter::new(&config.corpus_dir, config.save_interval)?;

        Ok(Self {
            frontier: Arc::new(Frontier::new()),
            domains: DashMap::new(),
            visited: DashMap::new(),
            corpus: Arc::new(corpus),
            global_permits: Arc::new(Semaphore::new(config.max_concurrency)),
            pages_written: AtomicUsize::new(0),
            client,
            config,
        })
    }

    /// Seeds the frontier and runs workers until the page budget is spent or
    /// the frontier drains.
    pub async fn run(self: Arc<Self>, seeds: Vec<Url>) -> Result<usize> {
        for url in &seeds {
            self.visited.insert(Fingerprint::from(url.as_str()), ());
        }
        self.frontier.load(seeds);

        let mut workers = Vec::with_capacity(self.config.max_concurrency);
        for _ in 0..self.config.max_concurrency {
            let engine = self.clone();
            workers.push(tokio::spawn(async move { engine.worker_loop().await }));
        }

        for worker in workers {
            let _ = worker.await;
        }

        Ok(self.pages_written.load(Ordering::Relaxed))
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            if self.pages_written.load(Ordering::Relaxed) >= self.config.max_page_count {
                self.frontier.close();
                return;
            }

            let Some(url) = self.frontier.get() else {
                return;
            };

            if self.pages_written.load(Ordering::Relaxed) >= self.config.max_page_count {
                self.frontier.close();
                return;
            }

            match self.fetch_page(&url).await {
                Ok(outlinks) => {
                    let written = self.pages_written.fetch_add(1, Ordering::Relaxed) + 1;
                    if self.config.show_progress {
                        tracing::info!(pages = written, url = %url, "fetched");
                    }
                    self.enqueue_new_links(outlinks);
                }
                Err(err) => {
                    if self.config.debug {
                        tracing::debug!(url = %url, error = %err, "fetch failed");
                    }
                }
            }
        }
    }

    fn enqueue_new_links(&self, links: Vec<Url>) {
        for link in links {
            let fp = Fingerprint::from(link.as_str());
            if self.visited.insert(fp, ()).is_none() {
                self.frontier.put(link);
            }
        }
    }

    async fn domain_for(&self, host: &str) -> Arc<DomainController> {
        if let Some(existing) = self.domains.get(host) {
            return existing.clone();
        }

        let controller = Arc::new(DomainController::new(host, &self.client, &self.config).await);
        self.domains
            .entry(host.to_string())
            .or_insert(controller)
            .clone()
    }

    /// Fetches and parses a single page, writes it to the corpus, and
    /// returns the absolute outlinks discovered on it.
    async fn fetch_page(&self, url: &Url) -> Result<Vec<Url>> {
        let host = host_of(url).ok_or_else(|| Error::MalformedUrl(url.to_string()))?;
        let domain = self.domain_for(&host).await;

        domain.wait_for_turn().await;

        if !domain.can_fetch(url)? {
            return Err(Error::Disallowed);
        }

        let _global_permit = self.global_permits.acquire().await.expect("not closed");
        let _domain_permit = domain.acquire().await;

        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(Error::FetchFailed(response.status()));
        }
        let body = response.text().await?;
        let fetch_time_ms = start.elapsed().as_millis() as usize;

        let parsed = html::parse(&body).ok_or(Error::InvalidHtml)?;

        self.corpus.write(CrawlRecord {
            url: url.to_string(),
            status_code,
            payload_type: None,
            body,
            fetch_time_ms,
        })?;

        let outlinks = parsed
            .links
            .iter()
            .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
            .filter_map(|href| Url::parse(href).ok())
            .collect();

        Ok(outlinks)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn checkpoint(&self) -> crate::checkpoint::Checkpoint {
        crate::checkpoint::Checkpoint {
            file_index: self.corpus.file_index(),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            frontier_len: self.frontier.len(),
            visited_len: self.visited.len(),
        }
    }
}

/// Reads one URL per non-blank line.
pub fn load_seeds(path: &std::path::Path) -> Result<Vec<Url>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| Url::parse(line).ok())
        .collect())
}
