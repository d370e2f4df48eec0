//! HTTP content store for a remote CMS exposing the `wp/v2` REST API.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use blockguard_core::{Document, DocumentId, DocumentStatus, RegistryEntry};
use blockguard_store::{ContentStore, ContentType, DocumentQuery, StoreError};
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

/// The API caps `per_page` at 100.
const MAX_PAGE: usize = 100;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown content type {0}")]
    UnknownType(String),
}

impl From<SyncError> for StoreError {
    fn from(err: SyncError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Deserialize)]
struct RemoteType {
    #[serde(default)]
    name: String,
    slug: String,
    rest_base: Option<String>,
    #[serde(default = "default_viewable")]
    viewable: bool,
}

fn default_viewable() -> bool {
    true
}

#[derive(Deserialize, Default)]
struct Rendered {
    #[serde(default)]
    raw: Option<String>,
    #[serde(default)]
    rendered: String,
}

impl Rendered {
    fn into_text(self) -> String {
        self.raw.unwrap_or(self.rendered)
    }
}

#[derive(Deserialize)]
struct RemoteDocument {
    id: DocumentId,
    #[serde(rename = "type")]
    content_type: String,
    status: String,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    content: Rendered,
    #[serde(default)]
    modified_gmt: Option<String>,
}

impl RemoteDocument {
    /// `None` for statuses outside the scanned set (trash, future, ...).
    fn into_document(self) -> Option<Document> {
        let status = match self.status.as_str() {
            "publish" => DocumentStatus::Published,
            "draft" => DocumentStatus::Draft,
            "pending" => DocumentStatus::Pending,
            "private" => DocumentStatus::Private,
            _ => return None,
        };
        let modified = self
            .modified_gmt
            .as_deref()
            .and_then(|ts| ts.parse::<NaiveDateTime>().ok())
            .map(|ts| ts.and_utc())
            .unwrap_or_else(Utc::now);
        Some(Document {
            id: self.id,
            title: self.title.into_text(),
            content_type: self.content_type,
            status,
            content: self.content.into_text(),
            modified,
        })
    }
}

#[derive(Deserialize)]
struct RemoteBlockType {
    name: String,
    #[serde(default)]
    is_dynamic: bool,
}

/// Content store backed by a remote site's REST API.
pub struct RestContentStore {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    /// content type name -> REST collection path
    bases: Mutex<BTreeMap<String, String>>,
    /// document id -> REST collection path, learnt from listings
    locations: Mutex<BTreeMap<DocumentId, String>>,
}

impl RestContentStore {
    /// `base_url` is the site root, e.g. `https://example.org` (no trailing slash).
    pub fn new(base_url: String, credentials: Option<(String, String)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            bases: Mutex::new(BTreeMap::new()),
            locations: Mutex::new(BTreeMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/wp-json/wp/v2/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Option<T>, SyncError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn fetch_types(&self) -> Result<Vec<(ContentType, String)>, SyncError> {
        let url = self.url("types?context=edit");
        debug!(url = %url, "fetching content types");
        let types: BTreeMap<String, RemoteType> = self
            .send(self.request(reqwest::Method::GET, &url))
            .await?
            .unwrap_or_default();
        Ok(parse_types(types))
    }

    async fn rest_base(&self, content_type: &str) -> Result<String, SyncError> {
        if let Some(base) = self
            .bases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_type)
        {
            return Ok(base.clone());
        }
        let types = self.fetch_types().await?;
        let mut bases = self.bases.lock().unwrap_or_else(PoisonError::into_inner);
        for (ty, base) in types {
            bases.insert(ty.name, base);
        }
        bases
            .get(content_type)
            .cloned()
            .ok_or_else(|| SyncError::UnknownType(content_type.to_string()))
    }

    /// Block types known to the remote site, as registry entries. Dynamic
    /// ones carry no local template.
    pub async fn fetch_block_types(&self) -> Result<Vec<RegistryEntry>, SyncError> {
        let url = self.url("block-types?context=edit");
        info!(url = %url, "fetching block types");
        let types: Vec<RemoteBlockType> = self
            .send(self.request(reqwest::Method::GET, &url))
            .await?
            .unwrap_or_default();
        info!(count = types.len(), "fetched block types");
        Ok(types
            .into_iter()
            .map(|t| RegistryEntry {
                name: t.name,
                render: None,
                dynamic: t.is_dynamic,
            })
            .collect())
    }
}

fn parse_types(types: BTreeMap<String, RemoteType>) -> Vec<(ContentType, String)> {
    types
        .into_values()
        .map(|t| {
            let base = t.rest_base.unwrap_or_else(|| t.slug.clone());
            let label = if t.name.is_empty() { t.slug.clone() } else { t.name };
            (
                ContentType {
                    name: t.slug,
                    label,
                    public: t.viewable,
                },
                base,
            )
        })
        .collect()
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn content_types(&self) -> Result<Vec<ContentType>, StoreError> {
        let types = self.fetch_types().await?;
        let mut bases = self.bases.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(types
            .into_iter()
            .map(|(ty, base)| {
                bases.insert(ty.name.clone(), base);
                ty
            })
            .collect())
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let base = self.rest_base(&query.content_type).await?;
        let statuses: Vec<&str> = query.statuses.iter().map(|s| s.as_str()).collect();
        let mut url = format!(
            "{}?context=edit&orderby=id&order=asc&per_page={}&offset={}",
            self.url(&base),
            query.limit.clamp(1, MAX_PAGE),
            query.offset
        );
        if !statuses.is_empty() {
            url.push_str(&format!("&status={}", statuses.join(",")));
        }
        debug!(url = %url, "listing documents");
        let docs: Vec<RemoteDocument> = self
            .send(self.request(reqwest::Method::GET, &url))
            .await?
            .unwrap_or_default();

        let docs: Vec<Document> = docs.into_iter().filter_map(RemoteDocument::into_document).collect();
        let mut locations = self.locations.lock().unwrap_or_else(PoisonError::into_inner);
        for doc in &docs {
            locations.insert(doc.id, base.clone());
        }
        Ok(docs)
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let known = self
            .locations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        let candidates = match known {
            Some(base) => vec![base],
            None => self
                .fetch_types()
                .await?
                .into_iter()
                .filter(|(ty, _)| ty.is_scannable())
                .map(|(_, base)| base)
                .collect(),
        };
        for base in candidates {
            let url = format!("{}/{id}?context=edit", self.url(&base));
            let found: Option<RemoteDocument> =
                self.send(self.request(reqwest::Method::GET, &url)).await?;
            if let Some(doc) = found.and_then(RemoteDocument::into_document) {
                self.locations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, base);
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    async fn update_content(&self, id: DocumentId, content: &str) -> Result<(), StoreError> {
        let doc = self.get(id).await?.ok_or(StoreError::DocumentNotFound(id))?;
        let base = self.rest_base(&doc.content_type).await?;
        let url = format!("{}/{id}", self.url(&base));
        info!(url = %url, document_id = id, "writing document content");
        let updated: Option<serde_json::Value> = self
            .send(
                self.request(reqwest::Method::POST, &url)
                    .json(&serde_json::json!({ "content": content })),
            )
            .await?;
        updated.map(|_| ()).ok_or(StoreError::DocumentNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_json_maps_to_document() {
        let json = r#"{
            "id": 42,
            "type": "page",
            "status": "draft",
            "title": {"raw": "About", "rendered": "About &amp; more"},
            "content": {"raw": "<!-- wp:paragraph --><p>x</p><!-- /wp:paragraph -->", "rendered": "<p>x</p>"},
            "modified_gmt": "2026-02-21T10:00:00"
        }"#;
        let remote: RemoteDocument = serde_json::from_str(json).unwrap();
        let doc = remote.into_document().unwrap();
        assert_eq!(doc.id, 42);
        assert_eq!(doc.content_type, "page");
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.title, "About");
        assert!(doc.content.starts_with("<!-- wp:paragraph -->"));
        assert_eq!(doc.modified.to_rfc3339(), "2026-02-21T10:00:00+00:00");
    }

    #[test]
    fn unscanned_status_is_dropped() {
        let json = r#"{"id": 1, "type": "post", "status": "trash"}"#;
        let remote: RemoteDocument = serde_json::from_str(json).unwrap();
        assert!(remote.into_document().is_none());
    }

    #[test]
    fn types_json_keeps_rest_base() {
        let json = r#"{
            "post": {"name": "Posts", "slug": "post", "rest_base": "posts", "viewable": true},
            "attachment": {"name": "Media", "slug": "attachment", "rest_base": "media", "viewable": true},
            "wp_block": {"name": "Patterns", "slug": "wp_block", "rest_base": "blocks", "viewable": false}
        }"#;
        let types = parse_types(serde_json::from_str(json).unwrap());
        let scannable: Vec<(&str, &str)> = types
            .iter()
            .filter(|(ty, _)| ty.is_scannable())
            .map(|(ty, base)| (ty.name.as_str(), base.as_str()))
            .collect();
        assert_eq!(scannable, vec![("post", "posts")]);
    }

    #[test]
    fn block_types_json() {
        let json = r#"[
            {"name": "core/paragraph", "is_dynamic": false},
            {"name": "core/latest-posts", "is_dynamic": true}
        ]"#;
        let types: Vec<RemoteBlockType> = serde_json::from_str(json).unwrap();
        assert!(!types[0].is_dynamic);
        assert!(types[1].is_dynamic);
    }

    #[test]
    fn store_trims_trailing_slash() {
        let store = RestContentStore::new("http://localhost:8080/".into(), None);
        assert_eq!(store.base_url, "http://localhost:8080");
        assert_eq!(store.url("posts"), "http://localhost:8080/wp-json/wp/v2/posts");
    }
}
