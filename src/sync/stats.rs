use std::sync::atomic::{AtomicU64, Ordering};

/// Per-component cycle counters. Stale drops and genuine failures are counted
/// separately so a slow backend is never mistaken for a broken one.
#[derive(Debug, Default)]
pub struct SyncCounters {
    started: AtomicU64,
    applied: AtomicU64,
    stale: AtomicU64,
    failed: AtomicU64,
}

impl SyncCounters {
    pub fn inc_started(&self) { self.started.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_applied(&self) { self.applied.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_stale(&self) { self.stale.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_failed(&self) { self.failed.fetch_add(1, Ordering::Relaxed); }

    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            started: self.started.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            stale_dropped: self.stale.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub started: u64,
    pub applied: u64,
    pub stale_dropped: u64,
    pub failed: u64,
}
