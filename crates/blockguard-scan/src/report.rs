//! Scan reports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use blockguard_core::{Document, DocumentId, Issue, IssueKind};
use blockguard_store::SnapshotInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ScanError;

/// Issues found in one document. Only documents with at least one issue
/// appear in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIssues {
    pub document_id: DocumentId,
    pub title: String,
    pub content_type: String,
    pub issues: Vec<Issue>,
}

/// A document the bulk recovery coordinator may repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryCandidate {
    pub document_id: DocumentId,
    pub title: String,
}

/// Aggregate outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub total_posts: usize,
    pub posts_with_issues: usize,
    pub total_issues: usize,
    pub issues_by_type: BTreeMap<IssueKind, usize>,
    /// Distinct block names seen per issue kind.
    pub blocks_by_type: BTreeMap<IssueKind, BTreeSet<String>>,
    pub posts: Vec<DocumentIssues>,
    pub summary: String,
    pub scanned_at: DateTime<Utc>,
    pub content_types: Vec<String>,
    /// The time budget ran out; the counts cover only what was examined.
    #[serde(default)]
    pub budget_exhausted: bool,
    #[serde(default)]
    pub limit_reached: bool,
    /// Documents whose markup could not be parsed; counted with zero issues.
    #[serde(default)]
    pub failed_documents: usize,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<SnapshotInfo>,
}

impl ScanReport {
    pub(crate) fn new(content_types: Vec<String>) -> Self {
        Self {
            total_posts: 0,
            posts_with_issues: 0,
            total_issues: 0,
            issues_by_type: BTreeMap::new(),
            blocks_by_type: BTreeMap::new(),
            posts: Vec::new(),
            summary: String::new(),
            scanned_at: Utc::now(),
            content_types,
            budget_exhausted: false,
            limit_reached: false,
            failed_documents: 0,
            elapsed_ms: 0,
            backup: None,
        }
    }

    /// Fold one examined document into the tallies.
    pub(crate) fn record(&mut self, doc: &Document, issues: Vec<Issue>) {
        self.total_posts += 1;
        if issues.is_empty() {
            return;
        }
        self.posts_with_issues += 1;
        self.total_issues += issues.len();
        for issue in &issues {
            *self.issues_by_type.entry(issue.kind).or_default() += 1;
            self.blocks_by_type
                .entry(issue.kind)
                .or_default()
                .insert(issue.block_name.clone());
        }
        self.posts.push(DocumentIssues {
            document_id: doc.id,
            title: doc.title.clone(),
            content_type: doc.content_type.clone(),
            issues,
        });
    }

    pub(crate) fn finish(&mut self, elapsed_ms: u64) {
        self.elapsed_ms = elapsed_ms;
        self.summary = self.describe();
    }

    fn describe(&self) -> String {
        let mut summary = if self.total_posts == 0 {
            "No documents scanned".to_string()
        } else if self.total_issues == 0 {
            format!("Scanned {} documents, no block issues found", self.total_posts)
        } else {
            let kinds: Vec<String> = self
                .issues_by_type
                .iter()
                .map(|(kind, n)| format!("{n} {kind}"))
                .collect();
            format!(
                "Scanned {} documents: {} with issues, {} issues ({})",
                self.total_posts,
                self.posts_with_issues,
                self.total_issues,
                kinds.join(", ")
            )
        };
        if self.budget_exhausted {
            summary.push_str("; time budget exhausted, results are partial");
        } else if self.limit_reached {
            summary.push_str("; document limit reached");
        }
        summary
    }

    /// `posts_with_issues <= total_posts`, the per-kind counts sum to
    /// `total_issues`, and every listed document has issues.
    pub fn check_invariants(&self) -> Result<(), ScanError> {
        if self.posts_with_issues > self.total_posts {
            return Err(ScanError::InvalidResult(format!(
                "{} documents with issues out of {} scanned",
                self.posts_with_issues, self.total_posts
            )));
        }
        let by_type: usize = self.issues_by_type.values().sum();
        if by_type != self.total_issues {
            return Err(ScanError::InvalidResult(format!(
                "issue counts by type sum to {by_type}, total is {}",
                self.total_issues
            )));
        }
        if self.posts.len() != self.posts_with_issues {
            return Err(ScanError::InvalidResult(format!(
                "{} documents listed, {} counted",
                self.posts.len(),
                self.posts_with_issues
            )));
        }
        if let Some(doc) = self.posts.iter().find(|d| d.issues.is_empty()) {
            return Err(ScanError::InvalidResult(format!(
                "document {} listed without issues",
                doc.document_id
            )));
        }
        Ok(())
    }

    /// Documents with a recovery-mode issue for `block_name`, in report order.
    #[must_use]
    pub fn recovery_candidates(&self, block_name: &str) -> Vec<RecoveryCandidate> {
        self.posts
            .iter()
            .filter(|doc| {
                doc.issues.iter().any(|issue| {
                    issue.kind == IssueKind::RecoveryModeDetected && issue.block_name == block_name
                })
            })
            .map(|doc| RecoveryCandidate {
                document_id: doc.document_id,
                title: doc.title.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_issues == 0
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::{DocumentStatus, Severity};

    fn issue(kind: IssueKind, block: &str) -> Issue {
        Issue {
            kind,
            severity: Severity::Medium,
            message: String::new(),
            block_name: block.into(),
            path: vec![0],
            suggestion: None,
        }
    }

    fn doc(id: DocumentId) -> Document {
        Document::new(id, "post", DocumentStatus::Published, format!("Doc {id}"), "")
    }

    #[test]
    fn tallies_hold_invariants() {
        let mut report = ScanReport::new(vec!["post".into()]);
        report.record(&doc(1), vec![]);
        report.record(
            &doc(2),
            vec![
                issue(IssueKind::RecoveryModeDetected, "custom/card"),
                issue(IssueKind::RecoveryModeDetected, "custom/card"),
            ],
        );
        report.record(&doc(3), vec![issue(IssueKind::UnregisteredCustomBlock, "custom/ghost")]);
        report.finish(5);

        report.check_invariants().unwrap();
        assert_eq!(report.total_posts, 3);
        assert_eq!(report.posts_with_issues, 2);
        assert_eq!(report.total_issues, 3);
        assert_eq!(report.issues_by_type[&IssueKind::RecoveryModeDetected], 2);
        assert_eq!(report.blocks_by_type[&IssueKind::RecoveryModeDetected].len(), 1);
        assert!(report.summary.contains("2 with issues"));
    }

    #[test]
    fn tampered_report_fails_invariants() {
        let mut report = ScanReport::new(vec![]);
        report.record(&doc(1), vec![issue(IssueKind::RecoveryModeDetected, "a/b")]);
        report.total_issues = 4;
        assert!(matches!(
            report.check_invariants(),
            Err(ScanError::InvalidResult(_))
        ));
    }

    #[test]
    fn candidates_only_for_recovery_mode_of_that_block() {
        let mut report = ScanReport::new(vec![]);
        report.record(&doc(1), vec![issue(IssueKind::RecoveryModeDetected, "custom/card")]);
        report.record(&doc(2), vec![issue(IssueKind::UnregisteredCustomBlock, "custom/card")]);
        report.record(&doc(3), vec![issue(IssueKind::RecoveryModeDetected, "custom/hero")]);

        let ids: Vec<DocumentId> = report
            .recovery_candidates("custom/card")
            .iter()
            .map(|c| c.document_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_issue_lists_serialize_as_arrays() {
        let mut report = ScanReport::new(vec!["page".into()]);
        report.finish(0);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["posts"].is_array());
        assert!(json["issues_by_type"].is_object());
        assert_eq!(report.to_string(), "No documents scanned");
    }
}
