//! `hash(term)` in the Python source is randomized per-process, which breaks
//! shard reloadability across runs. We use xxh3 instead: it is a stable,
//! unkeyed digest, so a term always lands on the same shard no matter which
//! process computed it.

use serde::{Deserialize, Serialize};

/// A 64-bit fingerprint of a byte string. Used for visited-URL dedup, where a
/// collision silently merges two distinct URLs into one "already seen" entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn new<T: AsRef<[u8]>>(data: T) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(data.as_ref()))
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

/// Maps `term` onto one of `num_shards` buckets using a stable 128-bit digest.
///
/// Panics if `num_shards` is 0.
pub fn shard_of(term: &str, num_shards: usize) -> usize {
    assert!(num_shards > 0, "num_shards must be positive");
    let digest = xxhash_rust::xxh3::xxh3_128(term.as_bytes());
    (digest % num_shards as u128) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::from("https://example.com/a");
        let b = Fingerprint::from("https://example.com/a");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_urls() {
        let a = Fingerprint::from("https://example.com/a");
        let b = Fingerprint::from("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn shard_of_is_stable_and_in_range() {
        for term in ["run", "dog", "the", "quick", "brown", "fox"] {
            let shard = shard_of(term, 16);
            assert!(shard < 16);
            assert_eq!(shard, shard_of(term, 16));
        }
    }

    #[test]
    fn shard_of_uses_all_buckets() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            seen.insert(shard_of(&format!("term{i}"), 16));
        }
        assert!(seen.len() > 8, "expected terms to spread across shards");
    }
}
