//! Process-wide exclusivity for scans.

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-holder lease over the scan aggregation state.
#[derive(Debug, Default)]
pub struct ScanGuard {
    running: AtomicBool,
}

impl ScanGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease, or `None` if another scan holds it.
    pub fn try_acquire(&self) -> Option<ScanLease<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanLease { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of one scan; dropping it releases the guard.
#[derive(Debug)]
pub struct ScanLease<'a> {
    guard: &'a ScanGuard,
}

impl Drop for ScanLease<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let guard = ScanGuard::new();
        let lease = guard.try_acquire().unwrap();
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());
        drop(lease);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }
}
