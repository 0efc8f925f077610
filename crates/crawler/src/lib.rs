//! A polite, concurrent web crawler that writes the pages it fetches to a
//! rotating gzip WARC corpus.
//!
//! The crawl loop lives in [`engine::Crawler`]; politeness and robots
//! enforcement is per-domain ([`domain::DomainController`]); URLs are
//! scheduled through a bounded randomized-priority [`frontier::Frontier`].

pub mod checkpoint;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod html;
pub mod warc_writer;

pub use config::CrawlerConfig;
pub use engine::Crawler;
pub use error::{Error, Result};
