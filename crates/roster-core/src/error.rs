use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading the roster source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read record: {0}")]
    Read(#[from] csv::Error),
}

impl SourceError {
    /// Create a new Open error
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
