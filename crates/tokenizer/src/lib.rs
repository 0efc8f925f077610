//! Pure-function tokenizer: lowercases a record's title and body, extracts
//! `\b\w+\b` word tokens, drops English stopwords, and stems survivors with
//! the Snowball English stemmer. Same input always yields the same token
//! stream, which the indexer relies on to derive in-document term
//! frequencies.

mod stopwords;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| stopwords::ENGLISH.iter().copied().collect());

/// Lowercases `title + " " + text`, extracts word tokens, drops stopwords,
/// and stems what's left. Token order is preserved.
pub fn tokenize(title: &str, text: &str) -> Vec<String> {
    let combined = format!("{title} {text}").to_lowercase();
    let stemmer = Stemmer::create(Algorithm::English);

    WORD_RE
        .find_iter(&combined)
        .map(|m| m.as_str())
        .filter(|word| !word.is_empty() && !STOPWORDS.contains(word))
        .map(|word| stemmer.stem(word).into_owned())
        .collect()
}

/// Tokenizes a single string (used for query text, which has no separate
/// title field).
pub fn tokenize_query(text: &str) -> Vec<String> {
    tokenize("", text)
}
