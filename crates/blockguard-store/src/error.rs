use blockguard_core::DocumentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("content store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
