//! Depth-first traversal of a parsed block tree.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::model::{BlockNode, Issue};
use crate::rules::{RuleContext, RuleSet};
use crate::validator::Validator;

/// Findings for one block tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeWalk {
    /// Issues in pre-order.
    pub issues: Vec<Issue>,
    /// Named blocks visited.
    pub blocks_seen: usize,
    /// Blocks whose validation panicked; they produce no issue.
    pub failed_blocks: usize,
    /// Blocks validated by the marker fallback after a render failure.
    pub degraded_blocks: usize,
}

/// Walk `blocks` pre-order, validating each named block and collecting the
/// issues `rules` raise for it.
///
/// Paths are child indices from the root. Freeform nodes are skipped. A
/// panic inside one block's validation is contained: the block is counted
/// as failed and traversal continues with its children and siblings.
pub fn walk(blocks: &[BlockNode], validator: &Validator<'_>, rules: &RuleSet) -> TreeWalk {
    let mut out = TreeWalk::default();
    let mut stack: Vec<(&BlockNode, Vec<usize>)> = blocks
        .iter()
        .enumerate()
        .rev()
        .map(|(i, block)| (block, vec![i]))
        .collect();

    while let Some((node, path)) = stack.pop() {
        for (i, child) in node.inner_blocks.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path));
        }

        if node.is_freeform() {
            continue;
        }
        out.blocks_seen += 1;

        let verdict = match catch_unwind(AssertUnwindSafe(|| validator.validate(node))) {
            Ok(verdict) => verdict,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(block = node.block_name(), ?path, %reason, "block validation panicked");
                out.failed_blocks += 1;
                continue;
            }
        };
        if verdict.degraded.is_some() {
            out.degraded_blocks += 1;
        }

        let ctx = RuleContext {
            block_name: node.block_name(),
            status: verdict.status,
            is_registered: validator.registry().contains(node.block_name()),
        };
        if let Some(issue) = rules.evaluate(&ctx, &path) {
            out.issues.push(issue);
        }
    }

    out
}
