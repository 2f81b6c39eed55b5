use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the flat-file stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Unavailable {
            path: path.into(),
            source,
        }
    }
}
