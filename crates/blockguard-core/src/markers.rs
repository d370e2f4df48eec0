//! Recovery-marker heuristic for static blocks.
//!
//! A static block's markup is produced by the editor at save time, so the
//! server has nothing to regenerate it from. The only evidence available
//! server-side is text the editor itself injects once it has already
//! flagged a block: its warning copy, its recovery action labels and its
//! error-state class names. Finding one of those in stored markup means the
//! block was saved while in recovery mode.
//!
//! # Limitation
//!
//! This check has false negatives. A static block whose markup drifted from
//! its current save function, but which was never opened and re-saved in the
//! editor, carries no marker and is reported valid. Only the editor runtime
//! can decide validity for such blocks; this module does not try to guess.

use crate::model::BlockStatus;

/// Case-insensitive markers the editor leaves behind in invalid blocks.
pub const RECOVERY_MARKERS: &[&str] = &[
    "this block contains unexpected or invalid content",
    "block contains unexpected or invalid content",
    "attempt block recovery",
    "attempt recovery",
    "resolve block",
    "convert to classic block",
    "block-editor-warning",
    "block-editor-block-list__block-crash-warning",
    "editor-block-list__block-crash-warning",
    "block-editor-block-list__block-invalid-warning",
    "has-warning is-invalid",
];

/// First marker found in `markup`, if any.
pub fn find_marker(markup: &str) -> Option<&'static str> {
    let haystack = markup.to_lowercase();
    RECOVERY_MARKERS
        .iter()
        .copied()
        .find(|marker| haystack.contains(marker))
}

/// `RecoveryMode` when any marker is present, `Valid` otherwise.
pub fn check_markers(markup: &str) -> BlockStatus {
    match find_marker(markup) {
        Some(_) => BlockStatus::RecoveryMode,
        None => BlockStatus::Valid,
    }
}
