//! Opens the on-disk index triple for random-access reads: the term
//! lexicon and document index are loaded fully into memory, while postings
//! are read lazily by seeking into `inverted_index.jsonl`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub df: usize,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Deserialize)]
struct PostingsLine {
    postings: BTreeMap<u32, u32>,
}

pub struct Index {
    lexicon: BTreeMap<String, LexiconEntry>,
    document_index: BTreeMap<u32, u32>,
    postings_file: Mutex<File>,
    pub doc_count: usize,
    pub avg_doc_len: f64,
}

impl Index {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let lexicon: BTreeMap<String, LexiconEntry> =
            serde_json::from_slice(&std::fs::read(dir.join("term_lexicon.json"))?)?;
        let document_index: BTreeMap<u32, u32> =
            serde_json::from_slice(&std::fs::read(dir.join("document_index.json"))?)?;

        let doc_count = document_index.len();
        let avg_doc_len = if doc_count > 0 {
            document_index.values().map(|&len| len as f64).sum::<f64>() / doc_count as f64
        } else {
            0.0
        };

        let postings_file = File::open(dir.join("inverted_index.jsonl"))?;

        Ok(Self {
            lexicon,
            document_index,
            postings_file: Mutex::new(postings_file),
            doc_count,
            avg_doc_len,
        })
    }

    pub fn df(&self, term: &str) -> usize {
        self.lexicon.get(term).map(|e| e.df).unwrap_or(0)
    }

    pub fn doc_len(&self, doc_id: u32) -> u32 {
        self.document_index.get(&doc_id).copied().unwrap_or(0)
    }

    /// Returns the term's postings as `{doc_id: freq}`, or empty if the term
    /// is absent from the lexicon -- a lexicon miss is not an error.
    pub fn read_postings(&self, term: &str) -> Result<BTreeMap<u32, u32>> {
        let Some(entry) = self.lexicon.get(term) else {
            return Ok(BTreeMap::new());
        };

        let mut buf = vec![0u8; entry.length as usize];
        {
            let mut file = self.postings_file.lock().unwrap_or_else(|e| e.into_inner());
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut buf)?;
        }

        let text = std::str::from_utf8(&buf).unwrap_or_default().trim_end();
        let line: PostingsLine = serde_json::from_str(text)?;
        Ok(line.postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_fixture(dir: &Path) {
        let mut index_file = File::create(dir.join("inverted_index.jsonl")).unwrap();
        let line1 = br#"{"term":"dog","postings":{"1":2,"2":1}}"#;
        let line2 = br#"{"term":"run","postings":{"2":1}}"#;
        index_file.write_all(line1).unwrap();
        index_file.write_all(b"\n").unwrap();
        let offset2 = line1.len() as u64 + 1;
        index_file.write_all(line2).unwrap();
        index_file.write_all(b"\n").unwrap();

        let lexicon = serde_json::json!({
            "dog": {"df": 2, "offset": 0, "length": line1.len() + 1},
            "run": {"df": 1, "offset": offset2, "length": line2.len() + 1},
        });
        std::fs::write(dir.join("term_lexicon.json"), lexicon.to_string()).unwrap();

        let document_index = serde_json::json!({"1": 2, "2": 2});
        std::fs::write(dir.join("document_index.json"), document_index.to_string()).unwrap();
    }

    #[test]
    fn read_postings_matches_lexicon_offsets() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());

        let index = Index::open(dir.path()).unwrap();
        assert_eq!(index.df("dog"), 2);

        let postings = index.read_postings("dog").unwrap();
        assert_eq!(postings.get(&1), Some(&2));
        assert_eq!(postings.get(&2), Some(&1));
    }

    #[test]
    fn unknown_term_yields_empty_postings() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());

        let index = Index::open(dir.path()).unwrap();
        assert!(index.read_postings("nonexistent").unwrap().is_empty());
    }

    #[test]
    fn computes_doc_count_and_avg_len() {
        let dir = tempfile::tempdir().unwrap();
        build_fixture(dir.path());

        let index = Index::open(dir.path()).unwrap();
        assert_eq!(index.doc_count, 2);
        assert_eq!(index.avg_doc_len, 2.0);
    }
}
