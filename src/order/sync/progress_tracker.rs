//! Progress tracking for bulk courier sync.
//!
//! `BulkSyncTracker` counts successes and failures across a batch and produces the one-line
//! summary logged when the batch ends.

use std::time::{Duration, Instant};
use tracing::info;

/// Tracks one bulk sync run
#[derive(Debug, Clone)]
pub struct BulkSyncTracker {
    /// Number of orders in the batch
    total: usize,
    succeeded: usize,
    /// Failure codes in the order they happened
    failures: Vec<&'static str>,
    started_at: Instant,
}

impl BulkSyncTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failures: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, code: &'static str) {
        self.failures.push(code);
    }

    /// Orders processed so far, successful or not.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }

    /// Log progress every ten orders, or when forced
    pub fn log_progress(&self, force: bool) {
        let processed = self.processed();
        if force || (processed > 0 && processed % 10 == 0) {
            info!(
                "Bulk sync progress: {}/{} processed, {} failed",
                processed,
                self.total,
                self.failures.len()
            );
        }
    }

    pub fn get_stats(&self) -> BulkSyncStats {
        let mut failure_codes: Vec<(&'static str, usize)> = Vec::new();
        for code in &self.failures {
            match failure_codes.iter_mut().find(|(c, _)| c == code) {
                Some((_, count)) => *count += 1,
                None => failure_codes.push((*code, 1)),
            }
        }

        BulkSyncStats {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failures.len(),
            failure_codes,
            elapsed: self.started_at.elapsed(),
        }
    }
}

/// Statistics about a finished bulk sync
#[derive(Debug, Clone)]
pub struct BulkSyncStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failure code with the number of orders that failed with it, in first-seen order
    pub failure_codes: Vec<(&'static str, usize)>,
    pub elapsed: Duration,
}

impl BulkSyncStats {
    /// Get a human-readable summary of the run
    pub fn summary(&self) -> String {
        format!(
            "Bulk sync of {} orders: {} succeeded, {} failed in {:.1}s{}",
            self.total,
            self.succeeded,
            self.failed,
            self.elapsed.as_secs_f64(),
            if self.failure_codes.is_empty() {
                String::new()
            } else {
                format!(
                    " ({})",
                    self.failure_codes
                        .iter()
                        .map(|(code, count)| format!("{} x{}", code, count))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_summary() {
        let mut tracker = BulkSyncTracker::new(5);
        tracker.record_success();
        tracker.record_success();
        tracker.record_failure("VALIDATION_ERROR");
        tracker.record_success();
        tracker.record_failure("VALIDATION_ERROR");

        assert_eq!(tracker.processed(), 5);
        assert_eq!(tracker.remaining(), 0);

        let stats = tracker.get_stats();
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failure_codes, vec![("VALIDATION_ERROR", 2)]);
        let summary = stats.summary();
        assert!(summary.starts_with("Bulk sync of 5 orders: 3 succeeded, 2 failed"));
        assert!(summary.ends_with("(VALIDATION_ERROR x2)"));
    }

    #[test]
    fn test_empty_batch_summary() {
        let stats = BulkSyncTracker::new(0).get_stats();
        assert!(!stats.summary().contains('('));
    }
}
