//! Block type registry and classification.
//!
//! A definition is decided once when a block is registered: either it
//! carries a server-side renderer ([`BlockDefinition::Dynamic`]) or its
//! markup only ever comes from the editor ([`BlockDefinition::Static`]).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::render::{BlockRenderer, TemplateRenderer, UnavailableRenderer};

#[derive(Clone)]
pub enum BlockDefinition {
    Dynamic(Arc<dyn BlockRenderer>),
    Static,
}

impl BlockDefinition {
    pub fn class(&self) -> BlockClass {
        match self {
            Self::Dynamic(_) => BlockClass::Dynamic,
            Self::Static => BlockClass::Static,
        }
    }
}

impl fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Static => f.write_str("Static"),
        }
    }
}

/// Result of [`BlockRegistry::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockClass {
    Dynamic,
    Static,
    /// Not registered; callers treat this as missing.
    Unknown,
}

impl fmt::Display for BlockClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => write!(f, "dynamic"),
            Self::Static => write!(f, "static"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One entry of a registry manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    /// Render template; its presence makes the block dynamic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<String>,
    /// Dynamic block whose renderer is not available locally.
    #[serde(default)]
    pub dynamic: bool,
}

/// Table of registered block types keyed by namespaced name.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: BTreeMap<String, BlockDefinition>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from manifest entries.
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.register_entry(entry);
        }
        registry
    }

    /// Load a JSON manifest (an array of [`RegistryEntry`]).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<RegistryEntry> =
            serde_json::from_str(&body).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), count = entries.len(), "loaded block registry");
        Ok(Self::from_entries(entries))
    }

    pub fn register_entry(&mut self, entry: RegistryEntry) {
        match (entry.render, entry.dynamic) {
            (Some(template), _) => {
                self.register_dynamic(entry.name, Arc::new(TemplateRenderer::new(template)))
            }
            (None, true) => self.register_dynamic(entry.name, Arc::new(UnavailableRenderer)),
            (None, false) => self.register_static(entry.name),
        }
    }

    pub fn register_dynamic(&mut self, name: impl Into<String>, renderer: Arc<dyn BlockRenderer>) {
        self.blocks
            .insert(name.into(), BlockDefinition::Dynamic(renderer));
    }

    pub fn register_static(&mut self, name: impl Into<String>) {
        self.blocks.insert(name.into(), BlockDefinition::Static);
    }

    /// Keep existing definitions, add any names not yet known.
    pub fn merge_missing(&mut self, other: BlockRegistry) {
        for (name, definition) in other.blocks {
            self.blocks.entry(name).or_insert(definition);
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.blocks.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Classify a block name against the current registry state.
    pub fn classify(&self, name: &str) -> BlockClass {
        self.get(name)
            .map_or(BlockClass::Unknown, BlockDefinition::class)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> BlockRegistry {
        BlockRegistry::from_entries([
            RegistryEntry {
                name: "core/paragraph".into(),
                render: None,
                dynamic: false,
            },
            RegistryEntry {
                name: "custom/card".into(),
                render: Some("<li>{{title}}</li>".into()),
                dynamic: false,
            },
            RegistryEntry {
                name: "core/latest-posts".into(),
                render: None,
                dynamic: true,
            },
        ])
    }

    #[test]
    fn classify_by_definition() {
        let registry = sample();
        assert_eq!(registry.classify("core/paragraph"), BlockClass::Static);
        assert_eq!(registry.classify("custom/card"), BlockClass::Dynamic);
        assert_eq!(registry.classify("core/latest-posts"), BlockClass::Dynamic);
        assert_eq!(registry.classify("custom/ghost-block"), BlockClass::Unknown);
    }

    #[test]
    fn classification_is_stable_for_fixed_state() {
        let registry = sample();
        let first: Vec<BlockClass> = registry.names().map(|n| registry.classify(n)).collect();
        let second: Vec<BlockClass> = registry.names().map(|n| registry.classify(n)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn classification_follows_registry_changes() {
        let mut registry = sample();
        assert!(registry.unregister("custom/card"));
        assert_eq!(registry.classify("custom/card"), BlockClass::Unknown);
        registry.register_static("custom/card");
        assert_eq!(registry.classify("custom/card"), BlockClass::Static);
    }

    #[test]
    fn merge_keeps_local_definitions() {
        let mut local = sample();
        let mut remote = BlockRegistry::new();
        remote.register_static("custom/card");
        remote.register_static("custom/extra");
        local.merge_missing(remote);
        assert_eq!(local.classify("custom/card"), BlockClass::Dynamic);
        assert_eq!(local.classify("custom/extra"), BlockClass::Static);
    }

    #[test]
    fn load_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"custom/card","render":"<li></li>"}},{{"name":"core/image"}}]"#
        )
        .unwrap();
        let registry = BlockRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.classify("core/image"), BlockClass::Static);
    }
}
