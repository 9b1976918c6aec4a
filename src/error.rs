use crate::catalog::error::CatalogError;
use crate::config::ConfigError;
use crate::store::error::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Dext3rError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create workspace directory '{0}'")]
    WorkspaceCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to create HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to determine workspace directory")]
    WorkspaceResolution(#[source] std::io::Error),
}
