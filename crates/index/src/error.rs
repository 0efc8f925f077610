#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("malformed corpus record")]
    Json(#[from] serde_json::Error),

    #[error("missing partial run during merge: {0}")]
    MissingPartial(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
