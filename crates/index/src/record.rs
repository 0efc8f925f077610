//! The corpus record schema consumed by the indexer: one JSON object per
//! line, at least `id`, `title`, `text`. Unknown fields are ignored.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}
