//! Thread-safe line-at-a-time reader over a JSONL corpus. `next_line`
//! serializes under a mutex so several indexing workers can share one
//! reader and each pull the next record in turn.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;
use crate::record::Record;

pub struct Reader {
    lines: Mutex<std::io::Lines<BufReader<File>>>,
}

impl Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: Mutex::new(BufReader::new(file).lines()),
        })
    }

    /// Reads and parses the next record, or `None` at EOF. Malformed lines
    /// are skipped with a warning rather than aborting the whole read.
    pub fn next_record(&self) -> Option<Record> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "corpus read error");
                    return None;
                }
                None => return None,
            };

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(record) => return Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed corpus line");
                    continue;
                }
            }
        }
    }

    /// Drains up to `n` records at once, for batch-oriented callers.
    pub fn next_batch(&self, n: usize) -> Vec<Record> {
        let mut batch = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_record() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        batch
    }
}
