//! WAND (Weak AND): dynamic-pruning disjunctive top-k retrieval. Skips
//! documents whose maximum possible score cannot displace the current
//! top-k threshold.

use min_max_heap::MinMaxHeap;

use crate::scorer::{Corpus, Ranker};

/// One query term's postings, parallel doc-id/freq arrays plus a cursor and
/// a precomputed per-term score upper bound.
pub struct TermPointer {
    doc_ids: Vec<u32>,
    freqs: Vec<u32>,
    cursor: usize,
    upper_bound: f64,
}

impl TermPointer {
    pub fn new(mut doc_ids_and_freqs: Vec<(u32, u32)>, upper_bound: f64) -> Self {
        doc_ids_and_freqs.sort_by_key(|(doc, _)| *doc);
        let (doc_ids, freqs) = doc_ids_and_freqs.into_iter().unzip();
        Self { doc_ids, freqs, cursor: 0, upper_bound }
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.doc_ids.len()
    }

    fn current_doc(&self) -> Option<u32> {
        self.doc_ids.get(self.cursor).copied()
    }

    fn current_freq(&self) -> u32 {
        self.freqs[self.cursor]
    }

    /// Advances the cursor to the first doc-id `>= target` (a skip).
    fn advance_to(&mut self, target: u32) {
        while let Some(doc) = self.current_doc() {
            if doc >= target {
                break;
            }
            self.cursor += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredDoc {
    doc_id: u32,
    score: f64,
}

impl Eq for ScoredDoc {}
impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs WAND over `pointers`, returning up to `k` docs sorted
/// score-descending. `doc_len` resolves a doc-id to its token count, needed
/// for the exact (not upper-bound) score computed once a pivot is found.
pub fn run(
    mut pointers: Vec<TermPointer>,
    ranker: Ranker,
    corpus: Corpus,
    k: usize,
    doc_len: &dyn Fn(u32) -> u32,
) -> Vec<(u32, f64)> {
    let mut heap: MinMaxHeap<ScoredDoc> = MinMaxHeap::with_capacity(k + 1);

    loop {
        pointers.retain(|p| !p.is_exhausted());
        if pointers.is_empty() {
            break;
        }

        pointers.sort_by_key(|p| p.current_doc().unwrap());

        let threshold = if heap.len() >= k {
            heap.peek_min().map(|d| d.score).unwrap_or(0.0)
        } else {
            0.0
        };

        let mut running = 0.0;
        let mut pivot = None;
        for (i, pointer) in pointers.iter().enumerate() {
            running += pointer.upper_bound;
            if running > threshold {
                pivot = Some(i);
                break;
            }
        }

        let Some(pivot) = pivot else {
            break;
        };

        let pivot_doc = pointers[pivot].current_doc().unwrap();
        let all_aligned = pointers[..=pivot]
            .iter()
            .all(|p| p.current_doc() == Some(pivot_doc));

        if all_aligned {
            let mut score = 0.0;
            let len = doc_len(pivot_doc);
            for pointer in pointers[..=pivot].iter_mut() {
                if pointer.current_doc() == Some(pivot_doc) {
                    let df = pointer.doc_ids.len();
                    score += ranker.score(corpus, df, pointer.current_freq(), len);
                    pointer.cursor += 1;
                }
            }

            if score > threshold || heap.len() < k {
                heap.push(ScoredDoc { doc_id: pivot_doc, score });
                if heap.len() > k {
                    heap.pop_min();
                }
            }
        } else {
            for pointer in pointers[..pivot].iter_mut() {
                pointer.advance_to(pivot_doc);
            }
        }
    }

    let mut results = Vec::with_capacity(heap.len());
    while let Some(doc) = heap.pop_max() {
        results.push((doc.doc_id, doc.score));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(
        pointers: &[(Vec<(u32, u32)>, usize)],
        ranker: Ranker,
        corpus: Corpus,
        doc_len: &dyn Fn(u32) -> u32,
        k: usize,
    ) -> Vec<(u32, f64)> {
        use std::collections::BTreeMap;
        let mut scores: BTreeMap<u32, f64> = BTreeMap::new();
        for (postings, df) in pointers {
            for &(doc, freq) in postings {
                *scores.entry(doc).or_insert(0.0) += ranker.score(corpus, *df, freq, doc_len(doc));
            }
        }
        let mut scored: Vec<(u32, f64)> = scores.into_iter().collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(k);
        scored
    }

    #[test]
    fn wand_matches_brute_force_on_small_index() {
        let corpus = Corpus { doc_count: 5, avg_doc_len: 10.0 };
        let ranker = Ranker::Bm25;
        let lengths = [(1, 8), (2, 12), (3, 6), (4, 15)];
        let doc_len = |doc: u32| lengths.iter().find(|(d, _)| *d == doc).map(|(_, l)| *l).unwrap_or(1);

        let term_a: Vec<(u32, u32)> = vec![(1, 3), (2, 1), (4, 2)];
        let term_b: Vec<(u32, u32)> = vec![(2, 2), (3, 1), (4, 1)];

        let df_a = term_a.len();
        let df_b = term_b.len();

        let ub_a = ranker.upper_bound(corpus, df_a, term_a.iter().map(|&(doc, freq)| (freq, doc_len(doc))));
        let ub_b = ranker.upper_bound(corpus, df_b, term_b.iter().map(|&(doc, freq)| (freq, doc_len(doc))));

        let pointers = vec![
            TermPointer::new(term_a.clone(), ub_a),
            TermPointer::new(term_b.clone(), ub_b),
        ];

        let got = run(pointers, ranker, corpus, 3, &doc_len);
        let expected = brute_force(&[(term_a, df_a), (term_b, df_b)], ranker, corpus, &doc_len, 3);

        let mut got_docs: Vec<u32> = got.iter().map(|(d, _)| *d).collect();
        let mut expected_docs: Vec<u32> = expected.iter().map(|(d, _)| *d).collect();
        got_docs.sort();
        expected_docs.sort();
        assert_eq!(got_docs, expected_docs);
    }

    #[test]
    fn empty_pointers_yield_no_results() {
        let corpus = Corpus { doc_count: 5, avg_doc_len: 10.0 };
        let got = run(Vec::new(), Ranker::Bm25, corpus, 10, &|_| 1);
        assert!(got.is_empty());
    }

    #[test]
    fn wand_matches_brute_force_on_randomized_index() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let num_docs = 200u32;
        let lengths: Vec<(u32, u32)> = (0..num_docs).map(|d| (d, rng.gen_range(1..50))).collect();
        let doc_len = |doc: u32| lengths[doc as usize].1;
        let corpus = Corpus {
            doc_count: num_docs as usize,
            avg_doc_len: lengths.iter().map(|(_, l)| *l as f64).sum::<f64>() / num_docs as f64,
        };
        let ranker = Ranker::Bm25;

        let mut term_postings = Vec::new();
        for _ in 0..5 {
            let mut docs: Vec<u32> = (0..num_docs).filter(|_| rng.gen_bool(0.3)).collect();
            docs.sort();
            let postings: Vec<(u32, u32)> = docs.iter().map(|&d| (d, rng.gen_range(1..10))).collect();
            term_postings.push(postings);
        }

        let pointers: Vec<TermPointer> = term_postings
            .iter()
            .map(|postings| {
                let df = postings.len();
                let per_posting = postings.iter().map(|&(doc, freq)| (freq, doc_len(doc)));
                TermPointer::new(postings.clone(), ranker.upper_bound(corpus, df, per_posting))
            })
            .collect();

        let dfs: Vec<usize> = term_postings.iter().map(|p| p.len()).collect();
        let pairs: Vec<(Vec<(u32, u32)>, usize)> =
            term_postings.into_iter().zip(dfs).collect();

        let got = run(pointers, ranker, corpus, 10, &doc_len);
        let expected = brute_force(&pairs, ranker, corpus, &doc_len, 10);

        let mut got_docs: Vec<u32> = got.iter().map(|(d, _)| *d).collect();
        let mut expected_docs: Vec<u32> = expected.iter().map(|(d, _)| *d).collect();
        got_docs.sort();
        expected_docs.sort();
        assert_eq!(got_docs, expected_docs, "WAND and brute force must agree on the top-k set");
    }
}
