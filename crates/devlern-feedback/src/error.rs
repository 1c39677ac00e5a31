use devlern_core::CatalogError;
use devlern_qlearn::QLearnError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("executor provided an unusable action catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("policy table persistence failed: {0}")]
    Persistence(#[from] QLearnError),
    #[error("agent has no table store configured")]
    NoStore,
    #[error("decision log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decision log could not be closed: {0}")]
    Close(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
