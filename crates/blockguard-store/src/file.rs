//! Content store backed by a JSON corpus export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use blockguard_core::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::content::{ContentStore, ContentType, DocumentQuery, MemoryStore};
use crate::{StoreError, atomic};

/// On-disk corpus layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub types: Vec<ContentType>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// A corpus file loaded into memory; write-backs rewrite the file atomically.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let body = std::fs::read_to_string(path).map_err(|err| {
            StoreError::Unavailable(format!("cannot read corpus {}: {err}", path.display()))
        })?;
        let corpus: Corpus = serde_json::from_str(&body)?;
        let types = if corpus.types.is_empty() {
            MemoryStore::default().types().to_vec()
        } else {
            corpus.types
        };
        info!(
            path = %path.display(),
            documents = corpus.documents.len(),
            types = types.len(),
            "opened corpus"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryStore::from_documents(types, corpus.documents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let corpus = Corpus {
            types: self.inner.types().to_vec(),
            documents: self.inner.documents(),
        };
        atomic::write_json(&self.path, &corpus)
    }
}

#[async_trait]
impl ContentStore for JsonFileStore {
    async fn content_types(&self) -> Result<Vec<ContentType>, StoreError> {
        self.inner.content_types().await
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        self.inner.list(query).await
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.inner.get(id).await
    }

    async fn update_content(&self, id: DocumentId, content: &str) -> Result<(), StoreError> {
        self.inner.set_content(id, content)?;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::DocumentStatus;

    #[tokio::test]
    async fn write_back_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        let corpus = Corpus {
            types: Vec::new(),
            documents: vec![Document::new(
                4,
                "post",
                DocumentStatus::Published,
                "Four",
                "<p>old</p>",
            )],
        };
        std::fs::write(&path, serde_json::to_string(&corpus).unwrap()).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(!store.content_types().await.unwrap().is_empty());
        store.update_content(4, "<p>new</p>").await.unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(4).await.unwrap().unwrap().content, "<p>new</p>");
    }

    #[test]
    fn missing_corpus_is_unavailable() {
        let err = JsonFileStore::open(Path::new("/nonexistent/corpus.json")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
