//! Drives a complete index build from a JSONL corpus: batched parallel
//! tokenization, memory-bounded in-RAM accumulation with spill to sorted
//! partial runs, and a final k-way merge into the on-disk index triple.

use std::collections::{BTreeMap, BinaryHeap};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use common::mem::RssProbe;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reader::Reader;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
struct PartialLine {
    term: String,
    postings: BTreeMap<u32, u32>,
}

pub struct StreamingIndexer {
    index_dir: PathBuf,
    memory_budget_mb: f64,
    batch_size: usize,
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub documents: usize,
    pub terms: usize,
    pub partial_runs: usize,
    pub total_postings: usize,
}

impl StreamingIndexer {
    pub fn new<P: AsRef<Path>>(index_dir: P, memory_budget_mb: f64) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            memory_budget_mb,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builds `inverted_index.jsonl`, `term_lexicon.json`, and
    /// `document_index.json` under `index_dir` from `reader`.
    pub fn build(&self, reader: &Reader) -> Result<BuildStats> {
        std::fs::create_dir_all(&self.index_dir)?;
        let spill_dir = self.index_dir.join(".spill");
        std::fs::create_dir_all(&spill_dir)?;

        let mut postings: BTreeMap<String, BTreeMap<u32, u32>> = BTreeMap::new();
        let mut document_index: BTreeMap<u32, u32> = BTreeMap::new();
        let mut rss = RssProbe::new();
        let mut partial_count = 0usize;
        let mut documents = 0usize;

        loop {
            let batch = reader.next_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            documents += batch.len();

            let tokenized: Vec<(u32, BTreeMap<String, u32>)> = batch
                .par_iter()
                .map(|record| {
                    let tokens = tokenizer::tokenize(&record.title, &record.text);
                    let mut freqs = BTreeMap::new();
                    for token in tokens {
                        *freqs.entry(token).or_insert(0) += 1;
                    }
                    (record.id, freqs)
                })
                .collect();

            for (doc_id, freqs) in tokenized {
                let doc_len: u32 = freqs.values().sum();
                document_index.insert(doc_id, doc_len);
                for (term, freq) in freqs {
                    postings.entry(term).or_default().insert(doc_id, freq);
                }
            }

            if rss.rss_mb().map(|mb| mb > 0.9 * self.memory_budget_mb).unwrap_or(false) {
                Self::spill(&spill_dir, partial_count, &postings)?;
                postings.clear();
                partial_count += 1;
            }
        }

        if !postings.is_empty() {
            Self::spill(&spill_dir, partial_count, &postings)?;
            partial_count += 1;
        }

        let (terms, total_postings) = self.merge(&spill_dir, partial_count, &document_index)?;

        std::fs::remove_dir_all(&spill_dir).ok();

        Ok(BuildStats {
            documents,
            terms,
            partial_runs: partial_count,
            total_postings,
        })
    }

    fn spill(
        spill_dir: &Path,
        index: usize,
        postings: &BTreeMap<String, BTreeMap<u32, u32>>,
    ) -> Result<()> {
        let path = spill_dir.join(format!("partial_{index}.jsonl"));
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        for (term, docs) in postings {
            let line = PartialLine {
                term: term.clone(),
                postings: docs.clone(),
            };
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Merges sorted partial runs via a k-way streaming merge keyed by term,
    /// writing the inverted index and lexicon as it goes.
    fn merge(
        &self,
        spill_dir: &Path,
        partial_count: usize,
        document_index: &BTreeMap<u32, u32>,
    ) -> Result<(usize, usize)> {
        let mut cursors: Vec<PartialCursor> = (0..partial_count)
            .map(|index| PartialCursor::open(spill_dir.join(format!("partial_{index}.jsonl"))))
            .collect::<Result<_>>()?;

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        for (index, cursor) in cursors.iter_mut().enumerate() {
            if let Some(line) = cursor.next()? {
                heap.push(HeapEntry { term: line.term.clone(), source: index, line });
            }
        }

        let mut writer = BufWriter::new(std::fs::File::create(
            self.index_dir.join("inverted_index.jsonl"),
        )?);
        let mut lexicon = BTreeMap::new();
        let mut offset: u64 = 0;
        let mut terms = 0usize;
        let mut total_postings = 0usize;

        while let Some(HeapEntry { term, source, line }) = heap.pop() {
            let mut merged_postings = line.postings;

            // fold in every other head that currently shares this term
            while let Some(top) = heap.peek() {
                if top.term != term {
                    break;
                }
                let HeapEntry { source: other_source, line: other_line, .. } = heap.pop().unwrap();
                merged_postings.extend(other_line.postings);
                if let Some(next) = cursors[other_source].next()? {
                    heap.push(HeapEntry { term: next.term.clone(), source: other_source, line: next });
                }
            }

            if let Some(next) = cursors[source].next()? {
                heap.push(HeapEntry { term: next.term.clone(), source, line: next });
            }

            let out_line = PartialLine { term: term.clone(), postings: merged_postings };
            let json =
                serde_json::to_string(&out_line).expect("postings line is always serializable");
            let bytes = json.as_bytes();

            writer.write_all(bytes)?;
            writer.write_all(b"\n")?;

            total_postings += out_line.postings.len();
            lexicon.insert(
                term,
                LexiconEntry {
                    df: out_line.postings.len(),
                    offset,
                    length: bytes.len() as u64 + 1,
                },
            );
            offset += bytes.len() as u64 + 1;
            terms += 1;
        }
        writer.flush()?;

        std::fs::write(
            self.index_dir.join("term_lexicon.json"),
            serde_json::to_vec(&lexicon).expect("lexicon is always serializable"),
        )?;
        std::fs::write(
            self.index_dir.join("document_index.json"),
            serde_json::to_vec(document_index).expect("document index is always serializable"),
        )?;

        Ok((terms, total_postings))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LexiconEntry {
    df: usize,
    offset: u64,
    length: u64,
}

struct HeapEntry {
    term: String,
    source: usize,
    line: PartialLine,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term
    }
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // reversed: BinaryHeap is a max-heap, we want ascending terms out first
        other.term.cmp(&self.term)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct PartialCursor {
    lines: std::io::Lines<BufReader<std::fs::File>>,
}

impl PartialCursor {
    fn open(path: PathBuf) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self { lines: BufReader::new(file).lines() })
    }

    fn next(&mut self) -> Result<Option<PartialLine>> {
        match self.lines.next() {
            Some(Ok(line)) => Ok(Some(serde_json::from_str(&line)?)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn corpus_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn builds_ascending_inverted_index() {
        let corpus = corpus_file(&[
            r#"{"id":1,"title":"Running dogs","text":"The dogs run."}"#,
            r#"{"id":2,"title":"Cats","text":"Cats sleep."}"#,
        ]);
        let reader = Reader::open(corpus.path()).unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let indexer = StreamingIndexer::new(out_dir.path(), 4096.0);
        let stats = indexer.build(&reader).unwrap();

        assert_eq!(stats.documents, 2);

        let contents =
            std::fs::read_to_string(out_dir.path().join("inverted_index.jsonl")).unwrap();
        let terms: Vec<String> = contents
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["term"].as_str().unwrap().to_string()
            })
            .collect();
        let mut sorted = terms.clone();
        sorted.sort();
        assert_eq!(terms, sorted, "terms must be ascending in the inverted index");
    }

    #[test]
    fn lexicon_offsets_point_at_exact_lines() {
        let corpus = corpus_file(&[r#"{"id":1,"title":"Running dogs","text":"The dogs run."}"#]);
        let reader = Reader::open(corpus.path()).unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let indexer = StreamingIndexer::new(out_dir.path(), 4096.0);
        indexer.build(&reader).unwrap();

        let index_bytes = std::fs::read(out_dir.path().join("inverted_index.jsonl")).unwrap();
        let lexicon: BTreeMap<String, LexiconEntry> =
            serde_json::from_slice(&std::fs::read(out_dir.path().join("term_lexicon.json")).unwrap())
                .unwrap();

        for (term, entry) in &lexicon {
            let slice = &index_bytes[entry.offset as usize..(entry.offset + entry.length) as usize];
            let parsed: serde_json::Value = serde_json::from_slice(
                &slice[..slice.len() - 1], // strip trailing newline before parsing
            )
            .unwrap();
            assert_eq!(parsed["term"].as_str().unwrap(), term);
            assert_eq!(parsed["postings"].as_object().unwrap().len(), entry.df);
        }
    }
}
