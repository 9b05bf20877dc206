use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("All topics failed: {0}")]
    AllSourcesFailed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Whether a bounded retry with backoff is worth attempting.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
