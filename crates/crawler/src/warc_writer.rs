//! A shared handle onto the rotating WARC corpus writer so that worker
//! tasks can write records concurrently without racing each other's I/O.

use std::path::Path;
use std::sync::Mutex;

use warc::{CrawlRecord, RotatingWarcWriter};

use crate::error::Result;

pub struct CorpusWriter {
    inner: Mutex<RotatingWarcWriter>,
}

impl CorpusWriter {
    pub fn new<P: AsRef<Path>>(dir: P, save_interval: usize) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(RotatingWarcWriter::new(dir, save_interval)?),
        })
    }

    pub fn write(&self, record: CrawlRecord) -> Result<()> {
        let mut writer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        writer.write(record)?;
        Ok(())
    }

    pub fn file_index(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .file_index()
    }

    pub fn close(self) -> Result<()> {
        self.inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .close()?;
        Ok(())
    }
}
