//! External-memory inverted indexer: a sharded in-memory index for ad hoc
//! membership probes, and a streaming builder that spills sorted partial
//! runs and merges them into the on-disk index triple consumed by the query
//! processor.

pub mod error;
pub mod postings;
pub mod reader;
pub mod record;
pub mod shard;
pub mod streaming;

pub use error::{Error, Result};
pub use reader::Reader;
pub use record::Record;
pub use shard::ShardedIndex;
pub use streaming::{BuildStats, StreamingIndexer};
