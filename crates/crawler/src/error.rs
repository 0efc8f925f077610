#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("fetch failed: {0}")]
    FetchFailed(reqwest::StatusCode),

    #[error("transport error")]
    Transport(#[from] reqwest::Error),

    #[error("malformed url: {0}")]
    MalformedUrl(String),

    #[error("robots.txt unfetchable for this domain")]
    RobotsUnfetchable,

    #[error("disallowed by robots.txt")]
    Disallowed,

    #[error("failed to parse page content")]
    InvalidHtml,

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("warc error")]
    Warc(#[from] warc::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
