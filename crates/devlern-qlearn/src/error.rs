use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QLearnError {
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed table row at line {line}: {reason}")]
    Tabular { line: usize, reason: String },
}

impl QLearnError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| QLearnError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, QLearnError>;
