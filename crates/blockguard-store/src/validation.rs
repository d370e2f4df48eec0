//! Validation records: durable proof that a human confirmed a repair.
//!
//! Records live in a flat map keyed `"{document_id}|{block_name}"`, so a
//! second confirmation of the same pair overwrites the timestamp instead of
//! adding a row. Every mutation writes the next map to disk while holding
//! the lock and only replaces the in-memory map once that write succeeds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use blockguard_core::DocumentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{StoreError, atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub document_id: DocumentId,
    pub block_name: String,
    pub validated_at: DateTime<Utc>,
}

pub fn record_key(document_id: DocumentId, block_name: &str) -> String {
    format!("{document_id}|{block_name}")
}

#[derive(Debug)]
pub struct ValidationStore {
    path: Option<PathBuf>,
    records: Mutex<BTreeMap<String, ValidationRecord>>,
}

impl ValidationStore {
    /// Records held in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open the record file at `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = match std::fs::read_to_string(path) {
            Ok(body) => serde_json::from_str(&body)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            records: Mutex::new(records),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ValidationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, records: &BTreeMap<String, ValidationRecord>) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => atomic::write_json(path, records),
            None => Ok(()),
        }
    }

    /// Persist `next`, then install it. A failed write leaves `current` as it was.
    fn commit(
        &self,
        current: &mut BTreeMap<String, ValidationRecord>,
        next: BTreeMap<String, ValidationRecord>,
    ) -> Result<(), StoreError> {
        self.persist(&next)?;
        *current = next;
        Ok(())
    }

    /// Insert or refresh the record for `(document_id, block_name)`.
    pub fn upsert(
        &self,
        document_id: DocumentId,
        block_name: &str,
    ) -> Result<ValidationRecord, StoreError> {
        let record = ValidationRecord {
            document_id,
            block_name: block_name.to_string(),
            validated_at: Utc::now(),
        };
        let mut records = self.lock();
        let mut next = records.clone();
        next.insert(record_key(document_id, block_name), record.clone());
        self.commit(&mut records, next)?;
        debug!(document_id, block = block_name, "validation recorded");
        Ok(record)
    }

    pub fn contains(&self, document_id: DocumentId, block_name: &str) -> bool {
        self.lock()
            .contains_key(&record_key(document_id, block_name))
    }

    pub fn get(&self, document_id: DocumentId, block_name: &str) -> Option<ValidationRecord> {
        self.lock()
            .get(&record_key(document_id, block_name))
            .cloned()
    }

    /// Records for one block name, ascending by document id.
    pub fn for_block(&self, block_name: &str) -> Vec<ValidationRecord> {
        let mut found: Vec<ValidationRecord> = self
            .lock()
            .values()
            .filter(|r| r.block_name == block_name)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.document_id);
        found
    }

    pub fn all(&self) -> Vec<ValidationRecord> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record for the given documents. Returns how many went.
    pub fn remove_documents(&self, document_ids: &[DocumentId]) -> Result<usize, StoreError> {
        if document_ids.is_empty() {
            return Ok(0);
        }
        let mut records = self.lock();
        let mut next = records.clone();
        next.retain(|_, r| !document_ids.contains(&r.document_id));
        let removed = records.len() - next.len();
        if removed > 0 {
            self.commit(&mut records, next)?;
        }
        Ok(removed)
    }

    /// Delete all records. Returns how many there were.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut records = self.lock();
        let removed = records.len();
        self.commit(&mut records, BTreeMap::new())?;
        Ok(removed)
    }
}
