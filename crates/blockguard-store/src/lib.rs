//! Storage layer: content store access, validation records, post-scan snapshots.

mod atomic;
mod content;
mod error;
mod file;
mod snapshot;
mod validation;

pub use atomic::write_json;
pub use content::{ContentStore, ContentType, DocumentQuery, MemoryStore, SYSTEM_CONTENT_TYPES};
pub use error::StoreError;
pub use file::{Corpus, JsonFileStore};
pub use snapshot::{DirectorySnapshot, SnapshotInfo, SnapshotSink};
pub use validation::{ValidationRecord, ValidationStore, record_key};
