use std::io;
use std::path::PathBuf;

use catalog_sdk::CatalogError;
use thiserror::Error;

use crate::orchestrator::OrchestratorError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to read image {path:?}: {source}")]
    Image { path: PathBuf, source: io::Error },
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("logging initialization failed: {0}")]
    Logging(String),
    #[error("terminal runtime error: {0}")]
    Runtime(String),
}
