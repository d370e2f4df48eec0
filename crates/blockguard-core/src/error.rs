use std::path::PathBuf;

use thiserror::Error;

/// Failure loading a rule set or registry manifest from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rule {id}: {reason}")]
    InvalidRule { id: String, reason: String },
}
