//! Human-readable terminal output.

use blockguard_recovery::{DocumentOutcome, GateStatus, RecoveryTally};
use blockguard_scan::{DocumentCheck, ScanReport};

const MAX_ISSUES_PER_DOCUMENT: usize = 10;

pub fn print_report(report: &ScanReport) {
    println!("=== Scan {} ===", report.scanned_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("{}", report.summary);
    println!();

    println!("Totals");
    println!("  {:<26} {}", "content types", report.content_types.join(", "));
    println!("  {:<26} {}", "documents scanned", report.total_posts);
    println!("  {:<26} {}", "documents with issues", report.posts_with_issues);
    println!("  {:<26} {}", "issues", report.total_issues);
    if report.failed_documents > 0 {
        println!("  {:<26} {}", "unparseable documents", report.failed_documents);
    }
    println!("  {:<26} {} ms", "elapsed", report.elapsed_ms);
    if let Some(backup) = &report.backup {
        println!("  {:<26} {} ({} documents)", "snapshot", backup.location, backup.documents);
    }

    if !report.issues_by_type.is_empty() {
        println!();
        println!("By kind");
        for (kind, count) in &report.issues_by_type {
            let blocks: Vec<&str> = report
                .blocks_by_type
                .get(kind)
                .map(|names| names.iter().map(String::as_str).collect())
                .unwrap_or_default();
            println!("  {:<34} {:>5}  {}", kind.as_str(), count, blocks.join(", "));
        }
    }

    for doc in &report.posts {
        println!();
        println!("#{} {} ({})", doc.document_id, doc.title, doc.content_type);
        for issue in doc.issues.iter().take(MAX_ISSUES_PER_DOCUMENT) {
            println!("  {issue}");
        }
        if doc.issues.len() > MAX_ISSUES_PER_DOCUMENT {
            println!("  ... and {} more", doc.issues.len() - MAX_ISSUES_PER_DOCUMENT);
        }
    }
}

pub fn print_check(check: &DocumentCheck) {
    println!("=== Document #{} ===", check.document_id);
    if let Some(err) = &check.error {
        println!("  could not be parsed: {err}");
        return;
    }
    println!("  {:<26} {}", "blocks seen", check.total_blocks_seen);
    println!("  {:<26} {}", "issues", check.issues.len());
    for issue in &check.issues {
        println!("  {issue}");
        if let Some(suggestion) = &issue.suggestion {
            println!("    -> {suggestion}");
        }
    }
}

pub fn print_gate(status: &GateStatus) {
    let state = if status.can_auto_recover {
        "open"
    } else {
        "closed"
    };
    println!(
        "  {:<34} {:>3} validated  gate {state}",
        status.block_name, status.validated_count
    );
}

pub fn print_tally(tally: &RecoveryTally) {
    println!("=== Bulk recovery: {} ===", tally.block_name);
    println!("  {:<26} {}", "targeted", tally.targeted);
    println!("  {:<26} {}", "already validated", tally.skipped_validated);
    println!("  {:<26} {}", "dispatched", tally.total);
    println!("  {:<26} {}", "succeeded", tally.succeeded);
    println!("  {:<26} {}", "failed", tally.failed);
    if tally.timed_out > 0 {
        println!("  {:<26} {}", "  of which timed out", tally.timed_out);
    }
    if tally.cancelled {
        println!("  cancelled before all documents were dispatched");
    }
    for result in &tally.results {
        let outcome = match &result.outcome {
            DocumentOutcome::Succeeded => "ok".to_string(),
            DocumentOutcome::Failed(reason) => format!("failed: {reason}"),
            DocumentOutcome::TimedOut => "timed out".to_string(),
        };
        println!("  #{:<8} {:<40} {outcome}", result.document_id, result.title);
    }
}
