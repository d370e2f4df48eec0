//! Corpus scanning: per-document detection, the batch orchestrator and its report.

mod cache;
mod detector;
mod error;
mod guard;
mod report;
mod scanner;

pub use cache::ReportCache;
pub use detector::detect;
pub use error::ScanError;
pub use guard::{ScanGuard, ScanLease};
pub use report::{DocumentIssues, RecoveryCandidate, ScanReport};
pub use scanner::{DocumentCheck, RuleSource, ScanOptions, ScanSettings, Scanner};
