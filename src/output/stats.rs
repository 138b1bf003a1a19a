//! Harvest statistics
//!
//! This module provides functionality for summarizing a finished harvest
//! from its progress counters and displaying it.

use crate::crawler::Record;
use crate::state::HarvestProgress;
use std::collections::HashMap;
use std::time::Duration;

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct HarvestStatistics {
    /// Page count discovered from the first page
    pub total_pages: u32,

    /// Pages whose records were obtained
    pub pages_completed: u32,

    /// Records in the collection
    pub records: u64,

    /// Estimate made from the page count
    pub expected_records: u64,

    /// Requests issued, including retries
    pub attempts: u64,

    /// Responses with a blocking status
    pub blocked: u64,

    /// Transport, status and parse failures
    pub transient_failures: u64,

    /// Backoff cycles run
    pub cooldowns: u64,

    /// Snapshots the sink accepted during cooldowns
    pub snapshots: u64,

    /// Snapshots the sink rejected
    pub sink_failures: u64,

    /// Most fetchers ever in flight at once; filled in by the coordinator
    pub peak_in_flight: usize,

    pub elapsed: Duration,

    /// Record count per organization type
    pub by_organization: HashMap<String, u64>,
}

impl HarvestStatistics {
    /// Builds statistics from the run's counters and its collection
    pub fn collect(progress: &HarvestProgress, records: &[Record]) -> Self {
        let mut by_organization = HashMap::new();
        for record in records {
            *by_organization
                .entry(record.organization.clone())
                .or_insert(0) += 1;
        }

        Self {
            total_pages: progress.total_pages(),
            pages_completed: progress.pages_completed(),
            records: records.len() as u64,
            expected_records: progress.expected_records(),
            attempts: progress.attempts(),
            blocked: progress.blocked(),
            transient_failures: progress.transient_failures(),
            cooldowns: progress.cooldowns(),
            snapshots: progress.snapshots(),
            sink_failures: progress.sink_failures(),
            peak_in_flight: 0,
            elapsed: progress.started_at().elapsed(),
            by_organization,
        }
    }

    /// Share of requests that did not fail or get blocked, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        let failed = self.blocked + self.transient_failures;
        (self.attempts.saturating_sub(failed) as f64 / self.attempts as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!(
        "  Pages harvested: {} / {}",
        stats.pages_completed, stats.total_pages
    );
    println!(
        "  Records collected: {} (estimated {})",
        stats.records, stats.expected_records
    );
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Requests:");
    println!("  Attempts: {}", stats.attempts);
    println!("  Blocked responses: {}", stats.blocked);
    println!("  Transient failures: {}", stats.transient_failures);
    println!("  Cooldown cycles: {}", stats.cooldowns);
    println!("  Peak concurrency: {}", stats.peak_in_flight);
    println!(
        "  Snapshots saved: {} ({} failed)",
        stats.snapshots, stats.sink_failures
    );
    println!();

    if !stats.by_organization.is_empty() {
        println!("Records by Organization:");
        let mut counts: Vec<_> = stats.by_organization.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (organization, count) in counts {
            let percentage = if stats.records > 0 {
                (*count as f64 / stats.records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", organization, count, percentage);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} attempts)",
        stats.success_rate(),
        stats.attempts
    );
}
