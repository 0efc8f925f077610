//! Top-k query processor: opens the lexicon-backed index, tokenizes a
//! query the same way the indexer tokenized documents, and runs WAND over
//! the resulting term pointers.

pub mod error;
pub mod lexicon;
pub mod scorer;
pub mod wand;

pub use error::{Error, Result};
pub use lexicon::Index;
pub use scorer::Ranker;

use scorer::Corpus;
use wand::TermPointer;

#[derive(Debug, serde::Serialize)]
pub struct QueryResult {
    #[serde(rename = "Query")]
    pub query: String,
    #[serde(rename = "Results")]
    pub results: Vec<ScoredDoc>,
}

#[derive(Debug, serde::Serialize)]
pub struct ScoredDoc {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Score")]
    pub score: f64,
}

/// Tokenizes `query`, builds a WAND term pointer per distinct present
/// token, and returns the top `page_size` results formatted for output.
pub fn process_query(index: &Index, query: &str, ranker: Ranker, page_size: usize) -> QueryResult {
    let tokens = tokenizer::tokenize_query(query);
    let corpus = Corpus { doc_count: index.doc_count, avg_doc_len: index.avg_doc_len };

    let mut pointers = Vec::new();
    for token in tokens {
        let postings = index.read_postings(&token).unwrap_or_default();
        if postings.is_empty() {
            continue;
        }
        let df = index.df(&token);
        let per_posting = postings.iter().map(|(&doc_id, &freq)| (freq, index.doc_len(doc_id)));
        let upper_bound = ranker.upper_bound(corpus, df, per_posting);
        let entries: Vec<(u32, u32)> = postings.into_iter().collect();
        pointers.push(TermPointer::new(entries, upper_bound));
    }

    let doc_len = |doc_id: u32| index.doc_len(doc_id);
    let scored = wand::run(pointers, ranker, corpus, page_size, &doc_len);

    let results = scored
        .into_iter()
        .map(|(doc_id, score)| ScoredDoc {
            id: format!("{doc_id:07}"),
            score: (score * 10_000.0).round() / 10_000.0,
        })
        .collect();

    QueryResult { query: query.to_string(), results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_fixture(dir: &std::path::Path) {
        let mut index_file = std::fs::File::create(dir.join("inverted_index.jsonl")).unwrap();
        let line_a = br#"{"term":"dog","postings":{"1":2,"2":1}}"#;
        let line_b = br#"{"term":"run","postings":{"2":1,"3":1}}"#;
        index_file.write_all(line_a).unwrap();
        index_file.write_all(b"\n").unwrap();
        let offset_b = line_a.len() as u64 + 1;
        index_file.write_all(line_b).unwrap();
        index_file.write_all(b"\n").unwrap();

        let lexicon = serde_json::json!({
            "dog": {"df": 2, "offset": 0, "length": line_a.len() + 1},
            "run": {"df": 2, "offset": offset_b, "length": line_b.len() + 1},
        });
        std::fs::write(dir.join("term_lexicon.json"), lexicon.to_string()).unwrap();
        std::fs::write(
            dir.join("document_index.json"),
            serde_json::json!({"1": 2, "2": 2, "3": 1}).to_string(),
        )
        .unwrap();
    }

    #[test]
    fn process_query_returns_ranked_results() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());
        let index = Index::open(dir.path()).unwrap();

        let result = process_query(&index, "Running dogs", Ranker::Bm25, 10);
        assert_eq!(result.query, "Running dogs");
        assert!(!result.results.is_empty());
        assert_eq!(result.results[0].id.len(), 7);
    }

    #[test]
    fn results_are_score_descending() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());
        let index = Index::open(dir.path()).unwrap();

        let result = process_query(&index, "dog run", Ranker::Bm25, 10);
        let scores: Vec<f64> = result.results.iter().map(|r| r.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);
    }

    #[test]
    fn unknown_query_terms_yield_no_results() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());
        let index = Index::open(dir.path()).unwrap();

        let result = process_query(&index, "xyzzy", Ranker::Bm25, 10);
        assert!(result.results.is_empty());
    }
}
