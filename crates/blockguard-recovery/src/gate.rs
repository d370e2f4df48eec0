//! Validation gate.
//!
//! Bulk recovery for a block name opens only after humans have confirmed
//! repairs of that block in at least [`AUTO_RECOVER_THRESHOLD`] distinct
//! documents that still exist. Counts are computed at read time against the
//! content store, so records for deleted documents never count.

use std::collections::BTreeSet;
use std::sync::Arc;

use blockguard_core::DocumentId;
use blockguard_store::{ContentStore, StoreError, ValidationRecord, ValidationStore};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Distinct validated documents needed before bulk recovery may run.
pub const AUTO_RECOVER_THRESHOLD: usize = 2;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub block_name: String,
    pub validated_count: usize,
    pub can_auto_recover: bool,
}

pub struct ValidationGate {
    records: Arc<ValidationStore>,
    content: Arc<dyn ContentStore>,
}

impl ValidationGate {
    pub fn new(records: Arc<ValidationStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { records, content }
    }

    pub fn records(&self) -> &ValidationStore {
        &self.records
    }

    /// Upsert the record for `(document_id, block_name)`.
    pub fn mark_validated(
        &self,
        document_id: DocumentId,
        block_name: &str,
    ) -> Result<ValidationRecord, GateError> {
        let block_name = require_block_name(block_name)?;
        Ok(self.records.upsert(document_id, block_name)?)
    }

    /// Human confirmation of a single-document repair.
    pub async fn confirm(
        &self,
        document_id: DocumentId,
        block_name: &str,
    ) -> Result<GateStatus, GateError> {
        let block_name = require_block_name(block_name)?;
        if document_id == 0 {
            return Err(GateError::InvalidInput("document id is required".into()));
        }
        if !self.content.exists(document_id).await? {
            return Err(GateError::DocumentNotFound(document_id));
        }
        self.mark_validated(document_id, block_name)?;
        let status = self.status(block_name).await?;
        info!(
            document_id,
            block = block_name,
            validated = status.validated_count,
            can_auto_recover = status.can_auto_recover,
            "repair confirmed"
        );
        Ok(status)
    }

    pub fn is_validated(&self, document_id: DocumentId, block_name: &str) -> bool {
        self.records.contains(document_id, block_name)
    }

    /// Distinct validated documents for `block_name` that still exist.
    pub async fn count_validated_for_block(&self, block_name: &str) -> Result<usize, GateError> {
        let mut count = 0;
        for record in self.records.for_block(block_name) {
            if self.content.exists(record.document_id).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Prunes stale records, then applies the threshold.
    pub async fn can_auto_recover(&self, block_name: &str) -> Result<bool, GateError> {
        self.cleanup_deleted_posts().await?;
        Ok(self.count_validated_for_block(block_name).await? >= AUTO_RECOVER_THRESHOLD)
    }

    pub async fn status(&self, block_name: &str) -> Result<GateStatus, GateError> {
        let validated_count = self.count_validated_for_block(block_name).await?;
        Ok(GateStatus {
            block_name: block_name.to_string(),
            validated_count,
            can_auto_recover: validated_count >= AUTO_RECOVER_THRESHOLD,
        })
    }

    /// Gate status of every block name that has records.
    pub async fn statuses(&self) -> Result<Vec<GateStatus>, GateError> {
        let names: BTreeSet<String> = self
            .records
            .all()
            .into_iter()
            .map(|record| record.block_name)
            .collect();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.status(&name).await?);
        }
        Ok(out)
    }

    /// Delete every record. Returns how many were removed.
    pub fn reset_all(&self) -> Result<usize, GateError> {
        let removed = self.records.clear()?;
        info!(removed, "validation records reset");
        Ok(removed)
    }

    /// Drop records whose document no longer exists. Returns the prune count.
    pub async fn cleanup_deleted_posts(&self) -> Result<usize, GateError> {
        let ids: BTreeSet<DocumentId> = self
            .records
            .all()
            .into_iter()
            .map(|record| record.document_id)
            .collect();
        let mut gone = Vec::new();
        for id in ids {
            if !self.content.exists(id).await? {
                gone.push(id);
            }
        }
        let pruned = self.records.remove_documents(&gone)?;
        if pruned > 0 {
            info!(pruned, documents = gone.len(), "pruned records for deleted documents");
        }
        Ok(pruned)
    }
}

fn require_block_name(block_name: &str) -> Result<&str, GateError> {
    let trimmed = block_name.trim();
    if trimmed.is_empty() {
        return Err(GateError::InvalidInput("block name is required".into()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::{Document, DocumentStatus};
    use blockguard_store::MemoryStore;

    fn setup(ids: &[DocumentId]) -> (Arc<MemoryStore>, ValidationGate) {
        let store = Arc::new(MemoryStore::new());
        for &id in ids {
            store.insert(Document::new(id, "post", DocumentStatus::Published, "", ""));
        }
        let gate = ValidationGate::new(Arc::new(ValidationStore::in_memory()), store.clone());
        (store, gate)
    }

    #[tokio::test]
    async fn threshold_opens_at_two_documents() {
        let (_store, gate) = setup(&[1, 2, 3]);
        assert!(!gate.can_auto_recover("custom/card").await.unwrap());

        let one = gate.confirm(1, "custom/card").await.unwrap();
        assert_eq!(one.validated_count, 1);
        assert!(!one.can_auto_recover);

        let again = gate.confirm(1, "custom/card").await.unwrap();
        assert_eq!(again.validated_count, 1);

        let two = gate.confirm(2, "custom/card").await.unwrap();
        assert_eq!(two.validated_count, 2);
        assert!(two.can_auto_recover);
        assert!(gate.can_auto_recover("custom/card").await.unwrap());
        assert!(!gate.can_auto_recover("custom/hero").await.unwrap());
    }

    #[tokio::test]
    async fn deleted_documents_stop_counting() {
        let (store, gate) = setup(&[1, 2]);
        gate.mark_validated(1, "custom/card").unwrap();
        gate.mark_validated(2, "custom/card").unwrap();
        assert_eq!(gate.count_validated_for_block("custom/card").await.unwrap(), 2);

        store.remove(2);
        assert_eq!(gate.count_validated_for_block("custom/card").await.unwrap(), 1);
        assert!(gate.is_validated(2, "custom/card"));
        assert!(!gate.can_auto_recover("custom/card").await.unwrap());
        assert!(!gate.is_validated(2, "custom/card"));
        assert_eq!(gate.cleanup_deleted_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn confirm_rejects_bad_input() {
        let (_store, gate) = setup(&[1]);
        assert!(matches!(
            gate.confirm(1, "  ").await,
            Err(GateError::InvalidInput(_))
        ));
        assert!(matches!(
            gate.confirm(0, "custom/card").await,
            Err(GateError::InvalidInput(_))
        ));
        assert!(matches!(
            gate.confirm(7, "custom/card").await,
            Err(GateError::DocumentNotFound(7))
        ));
        assert!(gate.records().is_empty());
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let (_store, gate) = setup(&[1, 2]);
        gate.mark_validated(1, "custom/card").unwrap();
        gate.mark_validated(2, "custom/hero").unwrap();
        assert_eq!(gate.statuses().await.unwrap().len(), 2);
        assert_eq!(gate.reset_all().unwrap(), 2);
        assert_eq!(gate.reset_all().unwrap(), 0);
        assert!(gate.statuses().await.unwrap().is_empty());
    }
}
