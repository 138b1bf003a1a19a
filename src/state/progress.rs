use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Shared progress counters for a harvest run
///
/// Every counter is monotonic. Fetch tasks bump the attempt and failure
/// counters, the coordinator bumps the completion counters and the backoff
/// cycle bumps the cooldown and sink counters.
#[derive(Debug)]
pub struct HarvestProgress {
    started_at: Instant,
    total_pages: AtomicU32,
    expected_records: AtomicU64,
    pages_completed: AtomicU32,
    records: AtomicU64,
    attempts: AtomicU64,
    blocked: AtomicU64,
    transient_failures: AtomicU64,
    cooldowns: AtomicU64,
    snapshots: AtomicU64,
    sink_failures: AtomicU64,
}

impl Default for HarvestProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestProgress {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_pages: AtomicU32::new(0),
            expected_records: AtomicU64::new(0),
            pages_completed: AtomicU32::new(0),
            records: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            transient_failures: AtomicU64::new(0),
            cooldowns: AtomicU64::new(0),
            snapshots: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Records the discovered page count and the resulting record estimate
    pub fn set_plan(&self, total_pages: u32, nominal_page_size: u32) {
        self.total_pages.store(total_pages, Ordering::Relaxed);
        self.expected_records.store(
            total_pages as u64 * nominal_page_size as u64,
            Ordering::Relaxed,
        );
    }

    /// Records a completed page; returns the number of pages completed so far
    pub fn record_page(&self, records: usize) -> u32 {
        self.records.fetch_add(records as u64, Ordering::Relaxed);
        self.pages_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown(&self) {
        self.cooldowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self, succeeded: bool) {
        if succeeded {
            self.snapshots.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages.load(Ordering::Relaxed)
    }

    pub fn expected_records(&self) -> u64 {
        self.expected_records.load(Ordering::Relaxed)
    }

    pub fn pages_completed(&self) -> u32 {
        self.pages_completed.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    pub fn transient_failures(&self) -> u64 {
        self.transient_failures.load(Ordering::Relaxed)
    }

    pub fn cooldowns(&self) -> u64 {
        self.cooldowns.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
