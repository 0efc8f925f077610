//! BM25 and TF-IDF scoring. Dispatch on ranker is a single tagged choice
//! made once at query start, not per posting.

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Ranker {
    #[value(name = "TFIDF")]
    TfIdf,
    #[value(name = "BM25")]
    Bm25,
}

impl std::fmt::Display for Ranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ranker::TfIdf => write!(f, "TFIDF"),
            Ranker::Bm25 => write!(f, "BM25"),
        }
    }
}

impl std::str::FromStr for Ranker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TFIDF" => Ok(Ranker::TfIdf),
            "BM25" => Ok(Ranker::Bm25),
            other => Err(format!("unknown ranker: {other}")),
        }
    }
}

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct Corpus {
    pub doc_count: usize,
    pub avg_doc_len: f64,
}

impl Ranker {
    /// Scores a single (term, doc) pairing; `df` is the term's document
    /// frequency, `freq` its in-document frequency, `doc_len` the document's
    /// token count.
    pub fn score(&self, corpus: Corpus, df: usize, freq: u32, doc_len: u32) -> f64 {
        let n = corpus.doc_count as f64;
        let df = df as f64;
        let freq = freq as f64;

        match self {
            Ranker::TfIdf => {
                let tf = 1.0 + freq.ln();
                let idf = (n / df).ln();
                tf * idf
            }
            Ranker::Bm25 => {
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let doc_len = doc_len as f64;
                let denom = freq + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / corpus.avg_doc_len);
                idf * freq * (BM25_K1 + 1.0) / denom
            }
        }
    }

    /// An upper bound on this ranker's score for a term: the true maximum
    /// over the term's actual postings, each scored against its own real
    /// document length -- not a synthetic worst case.
    pub fn upper_bound<I: IntoIterator<Item = (u32, u32)>>(
        &self,
        corpus: Corpus,
        df: usize,
        postings: I,
    ) -> f64 {
        postings
            .into_iter()
            .map(|(freq, doc_len)| self.score(corpus, df, freq, doc_len))
            .fold(0.0, f64::max)
    }
}
