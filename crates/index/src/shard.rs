//! A single index shard (term → postings list) and the sharded in-memory
//! indexer that routes terms to shards by a stable hash and evicts cold
//! shards to disk under memory pressure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::mem::RssProbe;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::postings::PostingsList;

/// Mapping term → postings list. Self-serializing as an opaque binary blob;
/// merging across shards is not done here (see the streaming indexer).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IndexShard {
    postings: HashMap<String, PostingsList>,
}

impl IndexShard {
    pub fn add(&mut self, term: &str, doc_id: u32) {
        self.postings.entry(term.to_string()).or_default().bump(doc_id);
    }

    pub fn contains(&self, term: &str, doc_id: u32) -> bool {
        self.postings
            .get(term)
            .map(|postings| postings.contains(doc_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self).expect("shard serialization is infallible"))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes).unwrap_or_default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    size: usize,
}

enum Slot {
    Resident(IndexShard),
    Evicted,
}

/// `N` shards keyed by a stable digest of the term, sampling process RSS
/// every 100 `add`s and evicting shards to disk once RSS exceeds `0.9 * M`.
pub struct ShardedIndex {
    dir: PathBuf,
    shards: Vec<Mutex<Slot>>,
    memory_budget_mb: f64,
    rss: Mutex<RssProbe>,
    ops_since_sample: Mutex<u64>,
}

impl ShardedIndex {
    pub fn new<P: AsRef<Path>>(dir: P, num_shards: usize, memory_budget_mb: f64) -> Self {
        let mut shards = Vec::with_capacity(num_shards);
        shards.resize_with(num_shards, || Mutex::new(Slot::Resident(IndexShard::default())));

        Self {
            dir: dir.as_ref().to_path_buf(),
            shards,
            memory_budget_mb,
            rss: Mutex::new(RssProbe::new()),
            ops_since_sample: Mutex::new(0),
        }
    }

    fn shard_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("shard_{index}.bin"))
    }

    fn shard_index(&self, term: &str) -> usize {
        common::shard_of(term, self.shards.len())
    }

    pub fn add(&self, term: &str, doc_id: u32) -> Result<()> {
        let index = self.shard_index(term);
        self.load_if_evicted(index)?;

        {
            let mut slot = self.shards[index].lock().unwrap_or_else(|e| e.into_inner());
            if let Slot::Resident(shard) = &mut *slot {
                shard.add(term, doc_id);
            }
        }

        self.maybe_evict()?;
        Ok(())
    }

    pub fn contains(&self, term: &str, doc_id: u32) -> Result<bool> {
        let index = self.shard_index(term);
        self.load_if_evicted(index)?;
        let slot = self.shards[index].lock().unwrap_or_else(|e| e.into_inner());
        Ok(match &*slot {
            Slot::Resident(shard) => shard.contains(term, doc_id),
            Slot::Evicted => false,
        })
    }

    fn load_if_evicted(&self, index: usize) -> Result<()> {
        let mut slot = self.shards[index].lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*slot, Slot::Evicted) {
            let path = self.shard_path(index);
            let shard = if path.exists() {
                IndexShard::from_bytes(&std::fs::read(path)?)?
            } else {
                IndexShard::default()
            };
            *slot = Slot::Resident(shard);
        }
        Ok(())
    }

    fn maybe_evict(&self) -> Result<()> {
        let mut ops = self.ops_since_sample.lock().unwrap_or_else(|e| e.into_inner());
        *ops += 1;
        if *ops < 100 {
            return Ok(());
        }
        *ops = 0;
        drop(ops);

        let rss_mb = {
            let mut probe = self.rss.lock().unwrap_or_else(|e| e.into_inner());
            probe.rss_mb()
        };

        let Some(rss_mb) = rss_mb else { return Ok(()) };
        if rss_mb <= 0.9 * self.memory_budget_mb {
            return Ok(());
        }

        for index in 0..self.shards.len() {
            self.evict(index)?;
            let rss_mb = {
                let mut probe = self.rss.lock().unwrap_or_else(|e| e.into_inner());
                probe.rss_mb()
            };
            if rss_mb.map(|rss| rss <= 0.9 * self.memory_budget_mb).unwrap_or(true) {
                break;
            }
        }

        Ok(())
    }

    fn evict(&self, index: usize) -> Result<()> {
        let mut slot = self.shards[index].lock().unwrap_or_else(|e| e.into_inner());
        if let Slot::Resident(shard) = &*slot {
            if !shard.is_empty() {
                std::fs::create_dir_all(&self.dir)?;
                std::fs::write(self.shard_path(index), shard.to_bytes()?)?;
            }
            *slot = Slot::Evicted;
        }
        Ok(())
    }

    /// Persists every resident shard plus a `metadata.json` descriptor.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        for index in 0..self.shards.len() {
            let slot = self.shards[index].lock().unwrap_or_else(|e| e.into_inner());
            if let Slot::Resident(shard) = &*slot {
                std::fs::write(self.shard_path(index), shard.to_bytes()?)?;
            }
        }
        let metadata = Metadata { size: self.shards.len() };
        std::fs::write(
            self.dir.join("metadata.json"),
            serde_json::to_vec_pretty(&metadata).expect("metadata is always serializable"),
        )?;
        Ok(())
    }

    /// Reads `metadata.json` from `dir` and loads every shard it describes.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let metadata: Metadata =
            serde_json::from_slice(&std::fs::read(dir.join("metadata.json"))?)?;

        let mut shards = Vec::with_capacity(metadata.size);
        for index in 0..metadata.size {
            let path = dir.join(format!("shard_{index}.bin"));
            let shard = IndexShard::from_bytes(&std::fs::read(path)?)?;
            shards.push(Mutex::new(Slot::Resident(shard)));
        }

        Ok(Self {
            dir,
            shards,
            memory_budget_mb: f64::MAX,
            rss: Mutex::new(RssProbe::new()),
            ops_since_sample: Mutex::new(0),
        })
    }
}
