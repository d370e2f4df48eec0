//! Structural validation of a single block.
//!
//! Dynamic blocks are regenerated from their attributes and compared with
//! the stored markup after [`normalize_markup`]. Static blocks cannot be
//! regenerated server-side and fall back to the marker heuristic in
//! [`crate::markers`], with its documented false negatives.

use tracing::{debug, warn};

use crate::markers::check_markers;
use crate::model::{BlockNode, BlockStatus};
use crate::normalize::normalize_markup;
use crate::registry::{BlockDefinition, BlockRegistry};

/// Outcome of validating one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: BlockStatus,
    /// Set when the renderer failed and the status came from the marker
    /// check instead of a structural comparison.
    pub degraded: Option<String>,
}

impl Verdict {
    fn exact(status: BlockStatus) -> Self {
        Self {
            status,
            degraded: None,
        }
    }
}

/// Validates blocks against the current registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r BlockRegistry,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r BlockRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r BlockRegistry {
        self.registry
    }

    /// Decide whether `block` is missing, valid, or in recovery mode.
    pub fn validate(&self, block: &BlockNode) -> Verdict {
        let name = block.block_name();
        let Some(definition) = self.registry.get(name) else {
            return Verdict::exact(BlockStatus::Missing);
        };

        let stored = block.stored_markup();
        if stored.is_empty() {
            return Verdict::exact(BlockStatus::Valid);
        }

        let renderer = match definition {
            BlockDefinition::Static => return Verdict::exact(check_markers(&stored)),
            BlockDefinition::Dynamic(renderer) => renderer,
        };

        let synthetic = BlockNode::named(name, block.attrs.clone());
        match renderer.render(&synthetic) {
            Ok(regenerated) => {
                let expected = normalize_markup(&regenerated);
                let actual = normalize_markup(&stored);
                if expected == actual {
                    Verdict::exact(BlockStatus::Valid)
                } else {
                    debug!(block = name, %expected, %actual, "stored markup differs from render");
                    Verdict::exact(BlockStatus::RecoveryMode)
                }
            }
            Err(err) => {
                warn!(block = name, error = %err, "render failed, using marker check");
                Verdict {
                    status: check_markers(&stored),
                    degraded: Some(err.to_string()),
                }
            }
        }
    }
}
