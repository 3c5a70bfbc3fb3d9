//! Error types for blockcheck.

use thiserror::Error;

/// Error type for blockcheck operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The dataset could not be retrieved or read at all
    #[error("source read error: {0}")]
    SourceRead(String),

    /// The dataset was readable but unusable as a whole
    #[error("dataset parse error: {0}")]
    Parse(String),

    /// A single address or network token is not valid
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// A query batch contained no addresses
    #[error("empty address batch")]
    EmptyBatch,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("download error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure concerns the dataset source and should be retried
    /// (bootstrap) or skipped until the next tick (refresh).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SourceRead(_) | Error::Parse(_) | Error::Io(_) | Error::Http(_)
        )
    }
}

/// Result type alias for blockcheck operations.
pub type Result<T> = std::result::Result<T, Error>;
