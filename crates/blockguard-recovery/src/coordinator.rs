//! Bulk recovery coordinator.
//!
//! Drives every unresolved recovery-mode occurrence of one block name through
//! an [`EditorRuntime`]. Documents are dispatched in report order, at most
//! `concurrency` at a time, each under its own timeout. Tallies and
//! validation writes happen only when a task has finished, so a timed-out
//! attempt can never also count as a success. Cancellation is observed only
//! before dispatching the next document.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use blockguard_core::{
    BlockRegistry, BlockStatus, DocumentId, ParseError, Validator, parse_blocks,
};
use blockguard_scan::{RecoveryCandidate, ScanReport};
use blockguard_store::ContentStore;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::gate::{AUTO_RECOVER_THRESHOLD, GateError, ValidationGate};
use crate::runtime::EditorRuntime;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "bulk recovery for {block} needs {required} validated documents, found {found}"
    )]
    GateClosed {
        block: String,
        found: usize,
        required: usize,
    },
    #[error("validation gate error: {0}")]
    Gate(#[from] GateError),
}

#[derive(Debug, Clone)]
pub struct RecoverySettings {
    /// Documents in flight at once. One keeps completion handling strictly
    /// sequential.
    pub concurrency: usize,
    pub document_timeout: Duration,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            document_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum DocumentOutcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentResult {
    pub document_id: DocumentId,
    pub title: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

/// Live progress, sent on every dispatch and every completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryProgress {
    pub completed: usize,
    pub total: usize,
    pub current_document_title: String,
}

/// Final accounting of one run. `succeeded + failed == total`, where
/// `total` counts dispatched documents; timeouts are included in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryTally {
    pub block_name: String,
    /// Candidates after excluding already-validated documents.
    pub targeted: usize,
    pub skipped_validated: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: bool,
    pub results: Vec<DocumentResult>,
}

impl RecoveryTally {
    fn settle(&mut self, candidate: RecoveryCandidate, outcome: DocumentOutcome) {
        match &outcome {
            DocumentOutcome::Succeeded => self.succeeded += 1,
            DocumentOutcome::Failed(_) => self.failed += 1,
            DocumentOutcome::TimedOut => {
                self.failed += 1;
                self.timed_out += 1;
            }
        }
        self.results.push(DocumentResult {
            document_id: candidate.document_id,
            title: candidate.title,
            outcome,
        });
    }

    fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

pub struct BulkRecovery {
    gate: Arc<ValidationGate>,
    runtime: Arc<dyn EditorRuntime>,
    store: Arc<dyn ContentStore>,
    registry: Arc<BlockRegistry>,
    settings: RecoverySettings,
    cancel: Arc<AtomicBool>,
}

impl BulkRecovery {
    pub fn new(
        gate: Arc<ValidationGate>,
        runtime: Arc<dyn EditorRuntime>,
        store: Arc<dyn ContentStore>,
        registry: Arc<BlockRegistry>,
    ) -> Self {
        Self {
            gate,
            runtime,
            store,
            registry,
            settings: RecoverySettings::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_settings(mut self, settings: RecoverySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Flag checked between documents; setting it stops further dispatch.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn recover_all(
        &self,
        report: &ScanReport,
        block_name: &str,
        progress: Option<UnboundedSender<RecoveryProgress>>,
    ) -> Result<RecoveryTally, RecoveryError> {
        let block_name = block_name.trim();
        if block_name.is_empty() {
            return Err(RecoveryError::InvalidInput("block name is required".into()));
        }
        if !self.gate.can_auto_recover(block_name).await? {
            let found = self.gate.count_validated_for_block(block_name).await?;
            return Err(RecoveryError::GateClosed {
                block: block_name.to_string(),
                found,
                required: AUTO_RECOVER_THRESHOLD,
            });
        }
        self.cancel.store(false, Ordering::SeqCst);

        let candidates = report.recovery_candidates(block_name);
        let found = candidates.len();
        let targets: Vec<RecoveryCandidate> = candidates
            .into_iter()
            .filter(|c| !self.gate.is_validated(c.document_id, block_name))
            .collect();

        let mut tally = RecoveryTally {
            block_name: block_name.to_string(),
            targeted: targets.len(),
            skipped_validated: found - targets.len(),
            ..RecoveryTally::default()
        };
        info!(
            block = block_name,
            targeted = tally.targeted,
            skipped = tally.skipped_validated,
            concurrency = self.settings.concurrency,
            "bulk recovery started"
        );

        let width = self.settings.concurrency.max(1);
        let mut queue = targets.into_iter().peekable();
        let mut in_flight = JoinSet::new();
        let mut dispatched: HashMap<tokio::task::Id, RecoveryCandidate> = HashMap::new();

        loop {
            while !tally.cancelled && in_flight.len() < width && queue.peek().is_some() {
                if self.cancel.load(Ordering::SeqCst) {
                    tally.cancelled = true;
                    break;
                }
                let Some(candidate) = queue.next() else {
                    break;
                };
                tally.total += 1;
                notify(&progress, &tally, &candidate.title);

                let runtime = self.runtime.clone();
                let block = block_name.to_string();
                let limit = self.settings.document_timeout;
                let id = candidate.document_id;
                let handle = in_flight.spawn(async move {
                    match tokio::time::timeout(limit, runtime.submit(id, &block)).await {
                        Ok(Ok(())) => DocumentOutcome::Succeeded,
                        Ok(Err(err)) => DocumentOutcome::Failed(err.to_string()),
                        Err(_) => DocumentOutcome::TimedOut,
                    }
                });
                dispatched.insert(handle.id(), candidate);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };
            let (candidate, outcome) = match joined {
                Ok((task, outcome)) => (dispatched.remove(&task), outcome),
                Err(err) => {
                    error!(error = %err, "recovery task aborted");
                    (
                        dispatched.remove(&err.id()),
                        DocumentOutcome::Failed(format!("task aborted: {err}")),
                    )
                }
            };
            let Some(candidate) = candidate else {
                continue;
            };

            let outcome = self.confirm_outcome(&candidate, block_name, outcome).await;
            let title = candidate.title.clone();
            tally.settle(candidate, outcome);
            notify(&progress, &tally, &title);
        }

        info!(
            block = block_name,
            total = tally.total,
            succeeded = tally.succeeded,
            failed = tally.failed,
            timed_out = tally.timed_out,
            cancelled = tally.cancelled,
            "bulk recovery finished"
        );
        Ok(tally)
    }

    /// Re-check a reported success against the stored document, and record
    /// the validation if it holds.
    async fn confirm_outcome(
        &self,
        candidate: &RecoveryCandidate,
        block_name: &str,
        outcome: DocumentOutcome,
    ) -> DocumentOutcome {
        let id = candidate.document_id;
        let outcome = match outcome {
            DocumentOutcome::Succeeded => match self.still_in_recovery(id, block_name).await {
                Ok(false) => match self.gate.mark_validated(id, block_name) {
                    Ok(_) => DocumentOutcome::Succeeded,
                    Err(err) => DocumentOutcome::Failed(format!("validation not recorded: {err}")),
                },
                Ok(true) => DocumentOutcome::Failed("block still in recovery mode after repair".into()),
                Err(reason) => DocumentOutcome::Failed(reason),
            },
            other => other,
        };
        match &outcome {
            DocumentOutcome::Succeeded => info!(document_id = id, block = block_name, "document recovered"),
            DocumentOutcome::Failed(reason) => {
                warn!(document_id = id, block = block_name, %reason, "document recovery failed")
            }
            DocumentOutcome::TimedOut => {
                warn!(document_id = id, block = block_name, "document recovery timed out")
            }
        }
        outcome
    }

    async fn still_in_recovery(&self, id: DocumentId, block_name: &str) -> Result<bool, String> {
        let doc = self
            .store
            .get(id)
            .await
            .map_err(|err| format!("re-check failed: {err}"))?
            .ok_or_else(|| format!("document {id} disappeared after repair"))?;
        any_in_recovery(&doc.content, block_name, &Validator::new(&self.registry))
            .map_err(|err| format!("re-check failed: {err}"))
    }
}

fn any_in_recovery(
    content: &str,
    block_name: &str,
    validator: &Validator<'_>,
) -> Result<bool, ParseError> {
    let blocks = parse_blocks(content)?;
    let mut stack: Vec<_> = blocks.iter().collect();
    while let Some(node) = stack.pop() {
        if node.block_name() == block_name
            && validator.validate(node).status == BlockStatus::RecoveryMode
        {
            return Ok(true);
        }
        stack.extend(node.inner_blocks.iter());
    }
    Ok(false)
}

fn notify(
    progress: &Option<UnboundedSender<RecoveryProgress>>,
    tally: &RecoveryTally,
    title: &str,
) {
    if let Some(tx) = progress {
        let _ = tx.send(RecoveryProgress {
            completed: tally.completed(),
            total: tally.total,
            current_document_title: title.to_string(),
        });
    }
}
