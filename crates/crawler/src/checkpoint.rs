//! An advisory snapshot of crawl progress, written alongside the corpus so
//! an operator can inspect how far a run got without waiting for it to
//! finish. Not read back on startup: a fresh run always starts from the
//! seed file.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct Checkpoint {
    pub file_index: usize,
    pub pages_written: usize,
    pub frontier_len: usize,
    pub visited_len: usize,
}

impl Checkpoint {
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join("checkpoint.json");
        let json = serde_json::to_string_pretty(self).expect("checkpoint is always serializable");
        std::fs::write(path, json)?;
        Ok(())
    }
}
