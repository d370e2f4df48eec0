//! Post-scan snapshots of documents that had issues.

use std::path::{Path, PathBuf};

use blockguard_core::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{StoreError, atomic};

/// Where a snapshot went and how much it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub location: String,
    pub documents: usize,
}

/// Receives the flagged documents at the end of a scan.
pub trait SnapshotSink: Send + Sync {
    fn write_snapshot(&self, documents: &[Document]) -> Result<SnapshotInfo, StoreError>;
}

#[derive(Serialize)]
struct SnapshotFile<'a> {
    created_at: DateTime<Utc>,
    documents: &'a [Document],
}

/// Writes each snapshot to `backup-<timestamp>.json` in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    dir: PathBuf,
}

impl DirectorySnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotSink for DirectorySnapshot {
    fn write_snapshot(&self, documents: &[Document]) -> Result<SnapshotInfo, StoreError> {
        let created_at = Utc::now();
        let path = self.dir.join(format!(
            "backup-{}.json",
            created_at.format("%Y%m%dT%H%M%S%.3fZ")
        ));
        atomic::write_json(
            &path,
            &SnapshotFile {
                created_at,
                documents,
            },
        )?;
        info!(path = %path.display(), documents = documents.len(), "snapshot written");
        Ok(SnapshotInfo {
            location: path.display().to_string(),
            documents: documents.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::DocumentStatus;

    #[test]
    fn snapshot_holds_full_documents() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySnapshot::new(dir.path().join("backups"));
        let docs = vec![Document::new(
            3,
            "page",
            DocumentStatus::Draft,
            "About",
            "<!-- wp:custom/card /-->",
        )];

        let info = sink.write_snapshot(&docs).unwrap();
        assert_eq!(info.documents, 1);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&info.location).unwrap()).unwrap();
        assert_eq!(raw["documents"][0]["id"], 3);
        assert_eq!(raw["documents"][0]["content"], "<!-- wp:custom/card /-->");
    }
}
