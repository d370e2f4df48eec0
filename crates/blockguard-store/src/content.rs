//! Content store access.
//!
//! The content store owns documents. Detection reads snapshots through
//! [`ContentStore`]; only the repair runtime writes back, and only a
//! document's markup.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use blockguard_core::{Document, DocumentId, DocumentStatus};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Internal content types that never hold user-authored block content.
pub const SYSTEM_CONTENT_TYPES: &[&str] = &[
    "attachment",
    "revision",
    "nav_menu_item",
    "custom_css",
    "customize_changeset",
    "oembed_cache",
    "user_request",
    "wp_block",
    "wp_template",
    "wp_template_part",
    "wp_global_styles",
    "wp_navigation",
    "wp_font_family",
    "wp_font_face",
];

/// A content type known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Publicly listed types are scanned by default.
    #[serde(default = "default_public")]
    pub public: bool,
}

fn default_public() -> bool {
    true
}

impl ContentType {
    pub fn new(name: impl Into<String>, public: bool) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            public,
        }
    }

    /// Public and not a system-internal type.
    pub fn is_scannable(&self) -> bool {
        self.public && !SYSTEM_CONTENT_TYPES.contains(&self.name.as_str())
    }
}

/// One page of a listing, ordered by document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub content_type: String,
    pub statuses: Vec<DocumentStatus>,
    pub offset: usize,
    pub limit: usize,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn content_types(&self) -> Result<Vec<ContentType>, StoreError>;

    /// Documents matching `query`, ascending by id. A store may return fewer
    /// than `query.limit` documents per page; an empty page ends the listing.
    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    async fn exists(&self, id: DocumentId) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Replace a document's markup.
    async fn update_content(&self, id: DocumentId, content: &str) -> Result<(), StoreError>;
}

/// Process-local store, used for corpus files and tests.
#[derive(Debug)]
pub struct MemoryStore {
    types: Vec<ContentType>,
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_types(vec![
            ContentType::new("post", true),
            ContentType::new("page", true),
            ContentType::new("attachment", true),
            ContentType::new("revision", false),
        ])
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(types: Vec<ContentType>) -> Self {
        Self {
            types,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_documents(types: Vec<ContentType>, documents: Vec<Document>) -> Self {
        let store = Self::with_types(types);
        for doc in documents {
            store.insert(doc);
        }
        store
    }

    pub fn insert(&self, doc: Document) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(doc.id, doc);
    }

    pub fn remove(&self, id: DocumentId) -> Option<Document> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn types(&self) -> &[ContentType] {
        &self.types
    }

    /// Copy of every document, ascending by id.
    pub fn documents(&self) -> Vec<Document> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn set_content(&self, id: DocumentId, content: &str) -> Result<(), StoreError> {
        let mut docs = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let doc = docs.get_mut(&id).ok_or(StoreError::DocumentNotFound(id))?;
        doc.content = content.to_string();
        doc.modified = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn content_types(&self) -> Result<Vec<ContentType>, StoreError> {
        Ok(self.types.clone())
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .values()
            .filter(|doc| doc.content_type == query.content_type)
            .filter(|doc| query.statuses.is_empty() || query.statuses.contains(&doc.status))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn update_content(&self, id: DocumentId, content: &str) -> Result<(), StoreError> {
        self.set_content(id, content)
    }
}
