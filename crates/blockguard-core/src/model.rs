//! Shared types for documents, parsed blocks and detection issues.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content store identity of a document.
pub type DocumentId = u64;

/// Publication status of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[serde(rename = "publish")]
    Published,
    Draft,
    Pending,
    Private,
}

impl DocumentStatus {
    /// Statuses a scan covers unless told otherwise.
    pub const SCANNABLE: [DocumentStatus; 4] = [
        DocumentStatus::Published,
        DocumentStatus::Draft,
        DocumentStatus::Pending,
        DocumentStatus::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "publish",
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of one stored document.
///
/// Owned by the content store. Detection only ever reads it; the repair
/// runtime writes back through the store, never through this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
    /// Content type tag (`post`, `page`, or a custom type).
    pub content_type: String,
    pub status: DocumentStatus,
    /// Raw block markup.
    pub content: String,
    pub modified: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: DocumentId,
        content_type: impl Into<String>,
        status: DocumentStatus,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content_type: content_type.into(),
            status,
            content: content.into(),
            modified: Utc::now(),
        }
    }
}

/// One parsed block occurrence.
///
/// `inner_content` interleaves raw markup fragments with `None` placeholders,
/// one per entry of `inner_blocks`, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    /// Fully namespaced name, `None` for freeform markup between blocks.
    pub name: Option<String>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
    #[serde(default)]
    pub inner_html: String,
    #[serde(default)]
    pub inner_content: Vec<Option<String>>,
    #[serde(default)]
    pub inner_blocks: Vec<BlockNode>,
}

impl BlockNode {
    /// A block with a name and attributes but no markup or children.
    pub fn named(name: impl Into<String>, attrs: Map<String, Value>) -> Self {
        Self {
            name: Some(name.into()),
            attrs,
            ..Self::default()
        }
    }

    /// A nameless node holding markup found between blocks.
    pub fn freeform(html: impl Into<String>) -> Self {
        let html = html.into();
        Self {
            name: None,
            attrs: Map::new(),
            inner_content: vec![Some(html.clone())],
            inner_html: html,
            inner_blocks: Vec::new(),
        }
    }

    /// Block name, or `""` for freeform nodes.
    pub fn block_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_freeform(&self) -> bool {
        self.block_name().is_empty()
    }

    /// Namespace part of the name (`core` when the name carries none).
    pub fn namespace(&self) -> &str {
        block_namespace(self.block_name())
    }

    /// Stored static markup: the string fragments of `inner_content` joined,
    /// child placeholders skipped, trimmed.
    pub fn stored_markup(&self) -> String {
        let joined: String = self
            .inner_content
            .iter()
            .filter_map(|fragment| fragment.as_deref())
            .collect();
        joined.trim().to_string()
    }

    /// Replace the static markup of a childless block.
    ///
    /// Returns `false` and leaves the node untouched if it has inner blocks,
    /// since their placeholder positions cannot be reconstructed.
    pub fn replace_markup(&mut self, markup: &str) -> bool {
        if !self.inner_blocks.is_empty() {
            return false;
        }
        self.inner_html = markup.to_string();
        self.inner_content = vec![Some(markup.to_string())];
        true
    }

    /// Total number of named blocks in this subtree, including `self`.
    pub fn count_named(&self) -> usize {
        let own = usize::from(!self.is_freeform());
        own + self
            .inner_blocks
            .iter()
            .map(BlockNode::count_named)
            .sum::<usize>()
    }
}

/// Namespace of a block name; names without a `/` live in `core`.
pub fn block_namespace(name: &str) -> &str {
    match name.split_once('/') {
        Some((ns, _)) => ns,
        None => "core",
    }
}

/// Outcome of validating one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockStatus {
    /// The block name is not registered.
    Missing,
    Valid,
    /// Stored markup no longer matches what the block would produce now.
    RecoveryMode,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Valid => "valid",
            Self::RecoveryMode => "recovery-mode",
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    UnregisteredCustomBlock,
    IncompatibleRequiresConversion,
    RecoveryModeDetected,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnregisteredCustomBlock => "unregistered-custom-block",
            Self::IncompatibleRequiresConversion => "incompatible-requires-conversion",
            Self::RecoveryModeDetected => "recovery-mode-detected",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A detection finding for one block position inside one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub block_name: String,
    /// Child indices from the document root down to the block.
    pub path: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(usize::to_string).collect();
        write!(
            f,
            "[{}] {} at /{}: {}",
            self.severity,
            self.kind,
            path.join("/"),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_markup_skips_child_placeholders() {
        let node = BlockNode {
            name: Some("core/group".into()),
            inner_content: vec![
                Some("  <div class=\"wrap\">".into()),
                None,
                Some("</div>\n".into()),
            ],
            inner_blocks: vec![BlockNode::named("core/paragraph", Map::new())],
            ..BlockNode::default()
        };
        assert_eq!(node.stored_markup(), "<div class=\"wrap\"></div>");
    }

    #[test]
    fn namespace_defaults_to_core() {
        assert_eq!(block_namespace("paragraph"), "core");
        assert_eq!(block_namespace("custom/card"), "custom");
        assert_eq!(BlockNode::freeform("<p>x</p>").block_name(), "");
    }

    #[test]
    fn replace_markup_refuses_parents() {
        let mut parent = BlockNode::named("core/group", Map::new());
        parent.inner_blocks.push(BlockNode::named("core/paragraph", Map::new()));
        assert!(!parent.replace_markup("<div></div>"));

        let mut leaf = BlockNode::named("custom/card", Map::new());
        assert!(leaf.replace_markup("<article></article>"));
        assert_eq!(leaf.stored_markup(), "<article></article>");
    }

    #[test]
    fn count_named_ignores_freeform() {
        let mut root = BlockNode::named("core/group", Map::new());
        root.inner_blocks.push(BlockNode::named("core/paragraph", Map::new()));
        root.inner_blocks.push(BlockNode::freeform("\n"));
        assert_eq!(root.count_named(), 2);
    }

    #[test]
    fn issue_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&IssueKind::RecoveryModeDetected).unwrap();
        assert_eq!(json, "\"recovery-mode-detected\"");
        let status: DocumentStatus = serde_json::from_str("\"publish\"").unwrap();
        assert_eq!(status, DocumentStatus::Published);
    }
}
