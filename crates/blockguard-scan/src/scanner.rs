//! Batch scan orchestrator.
//!
//! A scan enumerates the eligible content types, pages through each one in
//! fixed batches and runs detection on every document. The wall-clock budget
//! is polled before each batch and before each document; running out of time
//! ends the scan early with partial results rather than an error. Only one
//! scan may hold the aggregation state at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blockguard_core::{
    BlockRegistry, ConfigError, Document, DocumentId, DocumentStatus, Issue, RuleSet, Validator,
};
use blockguard_store::{ContentStore, DocumentQuery, SnapshotSink};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::ReportCache;
use crate::detector::detect;
use crate::guard::ScanGuard;
use crate::report::ScanReport;
use crate::ScanError;

/// Caller-facing scan parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Content types to cover; empty means every scannable type.
    pub content_types: Vec<String>,
    /// Stop after this many documents across all types.
    pub limit: Option<usize>,
    /// Ignore a cached report.
    pub force_refresh: bool,
}

impl ScanOptions {
    /// Apply a wire-style limit where any non-positive value means unlimited.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = usize::try_from(limit).ok().filter(|n| *n > 0);
        self
    }

    pub fn with_content_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.content_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub(crate) fn cache_key(&self) -> String {
        let mut types = self.content_types.clone();
        types.sort();
        types.dedup();
        format!("{}#{:?}", types.join(","), self.limit)
    }
}

/// Operator-tunable scan limits.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub batch_size: usize,
    pub time_budget: Duration,
    pub statuses: Vec<DocumentStatus>,
    pub cache_ttl: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            time_budget: Duration::from_secs(45),
            statuses: DocumentStatus::SCANNABLE.to_vec(),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Where a scan gets its rules. File rules are re-read on every scan.
#[derive(Debug, Clone)]
pub enum RuleSource {
    Fixed(RuleSet),
    File(PathBuf),
}

impl Default for RuleSource {
    fn default() -> Self {
        Self::Fixed(RuleSet::default())
    }
}

impl RuleSource {
    pub fn load(&self) -> Result<RuleSet, ConfigError> {
        match self {
            Self::Fixed(rules) => Ok(rules.clone()),
            Self::File(path) => RuleSet::load_or_default(path),
        }
    }
}

/// Result of checking a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCheck {
    pub success: bool,
    pub document_id: DocumentId,
    pub issues: Vec<Issue>,
    pub total_blocks_seen: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Scanner {
    store: Arc<dyn ContentStore>,
    registry: Arc<BlockRegistry>,
    rules: RuleSource,
    settings: ScanSettings,
    snapshots: Option<Arc<dyn SnapshotSink>>,
    guard: ScanGuard,
    cache: ReportCache,
}

impl Scanner {
    pub fn new(store: Arc<dyn ContentStore>, registry: Arc<BlockRegistry>) -> Self {
        let settings = ScanSettings::default();
        Self {
            store,
            registry,
            rules: RuleSource::default(),
            cache: ReportCache::new(settings.cache_ttl),
            settings,
            snapshots: None,
            guard: ScanGuard::new(),
        }
    }

    pub fn with_rules(mut self, rules: RuleSource) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.cache = ReportCache::new(settings.cache_ttl);
        self.settings = settings;
        self
    }

    pub fn with_snapshots(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Whether a scan currently holds the lease.
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Run one scan. Fails fast with [`ScanError::AlreadyRunning`] if another
    /// scan is in flight; a content store failure aborts the scan.
    pub async fn scan(&self, options: &ScanOptions) -> Result<ScanReport, ScanError> {
        let _lease = self.guard.try_acquire().ok_or(ScanError::AlreadyRunning)?;

        if !options.force_refresh {
            if let Some(report) = self.cache.get(options) {
                debug!(scanned_at = %report.scanned_at, "returning cached scan report");
                return Ok(report);
            }
        }

        let rules = self.rules.load()?;
        let start = Instant::now();
        let types = self.resolve_types(options).await?;
        info!(types = ?types, limit = ?options.limit, rules = rules.len(), "scan started");

        let validator = Validator::new(&self.registry);
        let mut report = ScanReport::new(types.clone());
        let mut flagged: Vec<Document> = Vec::new();
        let batch_size = self.settings.batch_size.max(1);

        'types: for content_type in &types {
            let mut offset = 0;
            loop {
                if start.elapsed() >= self.settings.time_budget {
                    report.budget_exhausted = true;
                    break 'types;
                }
                let remaining = options.limit.map(|limit| limit - report.total_posts);
                if remaining == Some(0) {
                    report.limit_reached = true;
                    break 'types;
                }

                let query = DocumentQuery {
                    content_type: content_type.clone(),
                    statuses: self.settings.statuses.clone(),
                    offset,
                    limit: batch_size,
                };
                let batch = self.store.list(&query).await?;
                let fetched = batch.len();
                debug!(content_type = %content_type, offset, fetched, "fetched batch");
                // Stores may cap page size below the batch size, so only an
                // empty page ends a content type.
                if fetched == 0 {
                    break;
                }

                for doc in batch {
                    if start.elapsed() >= self.settings.time_budget {
                        report.budget_exhausted = true;
                        break 'types;
                    }
                    if options.limit.is_some_and(|limit| report.total_posts >= limit) {
                        report.limit_reached = true;
                        break 'types;
                    }

                    let issues = match detect(&doc.content, &validator, &rules) {
                        Ok(found) => found.issues,
                        Err(err) => {
                            warn!(document_id = doc.id, error = %err, "document markup could not be parsed");
                            report.failed_documents += 1;
                            Vec::new()
                        }
                    };
                    let flag = !issues.is_empty();
                    report.record(&doc, issues);
                    if flag {
                        flagged.push(doc);
                    }
                }

                offset += fetched;
            }
        }

        if report.budget_exhausted {
            warn!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                scanned = report.total_posts,
                "scan time budget exhausted, returning partial results"
            );
        }

        if let Some(sink) = &self.snapshots {
            if !flagged.is_empty() {
                match sink.write_snapshot(&flagged) {
                    Ok(info) => report.backup = Some(info),
                    Err(err) => warn!(error = %err, documents = flagged.len(), "post-scan snapshot failed"),
                }
            }
        }

        report.finish(start.elapsed().as_millis() as u64);
        report.check_invariants()?;
        info!(
            total = report.total_posts,
            with_issues = report.posts_with_issues,
            issues = report.total_issues,
            elapsed_ms = report.elapsed_ms,
            "scan complete"
        );
        self.cache.put(options, &report);
        Ok(report)
    }

    /// Check one document, optionally against replacement markup.
    pub async fn check_document(
        &self,
        id: DocumentId,
        markup: Option<&str>,
    ) -> Result<DocumentCheck, ScanError> {
        let content = match markup {
            Some(markup) => markup.to_string(),
            None => {
                self.store
                    .get(id)
                    .await?
                    .ok_or(ScanError::DocumentNotFound(id))?
                    .content
            }
        };
        let rules = self.rules.load()?;
        let validator = Validator::new(&self.registry);
        Ok(match detect(&content, &validator, &rules) {
            Ok(found) => DocumentCheck {
                success: true,
                document_id: id,
                issues: found.issues,
                total_blocks_seen: found.blocks_seen,
                error: None,
            },
            Err(err) => {
                warn!(document_id = id, error = %err, "document markup could not be parsed");
                DocumentCheck {
                    success: false,
                    document_id: id,
                    issues: Vec::new(),
                    total_blocks_seen: 0,
                    error: Some(err.to_string()),
                }
            }
        })
    }

    async fn resolve_types(&self, options: &ScanOptions) -> Result<Vec<String>, ScanError> {
        if !options.content_types.is_empty() {
            let mut types: Vec<String> = Vec::new();
            for name in &options.content_types {
                if !types.contains(name) {
                    types.push(name.clone());
                }
            }
            return Ok(types);
        }
        Ok(self
            .store
            .content_types()
            .await?
            .into_iter()
            .filter(|t| t.is_scannable())
            .map(|t| t.name)
            .collect())
    }
}
