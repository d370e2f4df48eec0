//! Sync layer: remote content stores reached over HTTP.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{RestContentStore, SyncError};
