//! Per-domain politeness: a robots-rule cache plus a request-spacing lock
//! and a concurrency semaphore, one instance per host.
//!
//! The politeness mutex and the concurrency semaphore are deliberately
//! independent: the mutex enforces a minimum inter-arrival time between any
//! two requests to the domain, while the semaphore bounds how many of those
//! requests may be in flight at once. Holding both guarantees per-domain
//! minimum spacing while still allowing `max_concurrent_requests_per_domain`
//! requests in flight.

use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{Error, Result};

enum RobotsState {
    Allowed(robotstxt::Robots),
    /// robots.txt could not be fetched: every URL on this domain is dropped.
    Unfetchable,
}

pub struct DomainController {
    robots: RobotsState,
    last_request: StdMutex<Option<Instant>>,
    politeness: tokio::sync::Mutex<()>,
    semaphore: Semaphore,
    crawl_delay: Duration,
}

impl DomainController {
    /// Fetches and parses `http://<host>/robots.txt`. The host is marked
    /// unfetchable (and every URL on it subsequently dropped) if the fetch
    /// or parse fails.
    pub async fn new(host: &str, client: &reqwest::Client, config: &CrawlerConfig) -> Self {
        let robots = Self::fetch_robots(host, client, config).await;

        let crawl_delay = match &robots {
            RobotsState::Allowed(robots) => robots.crawl_delay().unwrap_or(config.crawl_delay),
            RobotsState::Unfetchable => config.crawl_delay,
        };

        Self {
            robots,
            last_request: StdMutex::new(None),
            politeness: tokio::sync::Mutex::new(()),
            semaphore: Semaphore::new(config.max_concurrent_requests_per_domain),
            crawl_delay,
        }
    }

    async fn fetch_robots(
        host: &str,
        client: &reqwest::Client,
        config: &CrawlerConfig,
    ) -> RobotsState {
        let url = format!("http://{host}/robots.txt");

        let body = match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => res.text().await.ok(),
            // a missing robots.txt means everything is allowed, per RFC 9309 `5xx`/`404` rules.
            Ok(res) if res.status().as_u16() == 404 => Some(String::new()),
            _ => None,
        };

        match body {
            Some(body) => match robotstxt::Robots::parse(&config.user_agent, &body) {
                Ok(robots) => RobotsState::Allowed(robots),
                Err(_) => RobotsState::Unfetchable,
            },
            None => RobotsState::Unfetchable,
        }
    }

    pub fn can_fetch(&self, url: &Url) -> Result<bool> {
        match &self.robots {
            RobotsState::Allowed(robots) => Ok(robots.is_allowed(url)),
            RobotsState::Unfetchable => Err(Error::RobotsUnfetchable),
        }
    }

    /// Blocks the caller until at least `crawl_delay` has elapsed since the
    /// last request to this domain, then records the new request time.
    /// Must be called while holding a permit from [`DomainController::acquire`].
    pub async fn wait_for_turn(&self) {
        let _politeness_guard = self.politeness.lock().await;

        let wait = {
            let last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            last.map(|t| self.crawl_delay.saturating_sub(t.elapsed()))
        };

        if let Some(wait) = wait {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    /// Acquires a per-domain concurrency permit. Held across the HTTP GET.
    pub async fn acquire(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("domain semaphore should never be closed")
    }
}

/// Extracts the host from a URL, as required for domain controller lookup.
/// Returns `None` for malformed or schemeless URLs.
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_string())
}
