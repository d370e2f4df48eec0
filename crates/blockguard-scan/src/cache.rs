use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::report::ScanReport;
use crate::scanner::ScanOptions;

struct Entry {
    key: String,
    stored_at: Instant,
    report: ScanReport,
}

/// Last completed report, reused for identical options until it expires.
pub struct ReportCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn get(&self, options: &ScanOptions) -> Option<ScanReport> {
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|e| e.key == options.cache_key() && e.stored_at.elapsed() < self.ttl)
            .map(|e| e.report.clone())
    }

    pub fn put(&self, options: &ScanOptions, report: &ScanReport) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(Entry {
            key: options.cache_key(),
            stored_at: Instant::now(),
            report: report.clone(),
        });
    }

    pub fn clear(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
