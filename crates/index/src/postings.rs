//! A sorted postings list for one term: doc-ids ascending, each with its
//! in-document frequency, plus a sparse skip table so membership probes on
//! large lists don't degrade to a linear scan.

use serde::{Deserialize, Serialize};

/// One skip pointer every `sqrt(len)` entries, rebuilt whenever the list
/// grows past its last checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingsList {
    doc_ids: Vec<u32>,
    freqs: Vec<u32>,
    skips: Vec<usize>,
    skip_stride: usize,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `(doc_id, freq)`. Callers MUST supply doc-ids in strictly
    /// ascending order within a term; this is an indexer-side invariant, not
    /// one enforced here, so that repeated `append`s of the same doc can
    /// instead go through [`PostingsList::bump`].
    pub fn append(&mut self, doc_id: u32, freq: u32) {
        self.doc_ids.push(doc_id);
        self.freqs.push(freq);
        self.rebuild_skips();
    }

    /// Increments the frequency of the last-appended doc if it matches
    /// `doc_id`, otherwise appends a new entry. Used by the in-memory
    /// indexer, where a document's tokens are added one at a time.
    pub fn bump(&mut self, doc_id: u32) {
        if self.doc_ids.last() == Some(&doc_id) {
            *self.freqs.last_mut().unwrap() += 1;
        } else {
            self.append(doc_id, 1);
        }
    }

    fn rebuild_skips(&mut self) {
        let stride = (self.doc_ids.len() as f64).sqrt().ceil() as usize;
        let stride = stride.max(1);
        self.skip_stride = stride;
        self.skips = (0..self.doc_ids.len()).step_by(stride).collect();
    }

    /// Membership probe using the skip table to narrow the scan range.
    pub fn contains(&self, doc_id: u32) -> bool {
        if self.doc_ids.is_empty() {
            return false;
        }

        let mut start = 0;
        for &checkpoint in &self.skips {
            if self.doc_ids[checkpoint] <= doc_id {
                start = checkpoint;
            } else {
                break;
            }
        }

        self.doc_ids[start..].binary_search(&doc_id).is_ok()
    }

    pub fn doc_ids(&self) -> &[u32] {
        &self.doc_ids
    }

    pub fn freqs(&self) -> &[u32] {
        &self.freqs
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Flat id sequence, for the spill format's on-disk shape.
    pub fn to_flat_ids(&self) -> Vec<u32> {
        self.doc_ids.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_contains() {
        let mut postings = PostingsList::new();
        for doc in [1, 4, 9, 16, 25] {
            postings.append(doc, 1);
        }
        assert!(postings.contains(9));
        assert!(!postings.contains(10));
    }

    #[test]
    fn bump_increments_repeated_doc() {
        let mut postings = PostingsList::new();
        postings.bump(3);
        postings.bump(3);
        postings.bump(5);
        assert_eq!(postings.doc_ids(), &[3, 5]);
        assert_eq!(postings.freqs(), &[2, 1]);
    }

    #[test]
    fn skip_table_covers_large_lists() {
        let mut postings = PostingsList::new();
        for doc in 0..10_000u32 {
            postings.append(doc * 2, 1);
        }
        for doc in (0..10_000u32).step_by(37) {
            assert!(postings.contains(doc * 2));
            assert!(!postings.contains(doc * 2 + 1));
        }
    }
}
