//! Error types for N5 operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for N5 operations
#[derive(Error, Debug)]
pub enum N5Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid group path: {0}")]
    InvalidPath(String),

    #[error("Malformed metadata at {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Lock acquisition on {path} interrupted: {reason}")]
    LockInterrupted { path: PathBuf, reason: String },

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl N5Error {
    /// Attach the failing path to a filesystem error
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        N5Error::IoAt {
            path: path.into(),
            source,
        }
    }
}

/// Specialized Result type for N5 operations
pub type Result<T> = std::result::Result<T, N5Error>;

impl From<serde_json::Error> for N5Error {
    fn from(err: serde_json::Error) -> Self {
        N5Error::Serialization(err.to_string())
    }
}
