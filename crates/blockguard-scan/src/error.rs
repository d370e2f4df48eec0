use blockguard_core::{ConfigError, DocumentId};
use blockguard_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,
    #[error("scan produced an inconsistent report: {0}")]
    InvalidResult(String),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("content store error: {0}")]
    Store(#[from] StoreError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
