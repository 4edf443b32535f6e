//! Outcome and statistics types returned by [`crate::Distributor`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use covina_core::StoreKind;

/// The outcome of distributing a single processor result.
#[derive(Debug, Clone)]
pub struct DistributionOutcome {
    /// The document id the distributed result belonged to.
    pub document_id: String,
    /// Ids stored at each store kind that accepted a write.
    pub distributed_to: HashMap<StoreKind, Vec<String>>,
    /// Non-fatal errors collected from targets that failed to write.
    pub errors: Vec<String>,
    /// True if any target in the plan was a fallback, not a primary target.
    pub fallback_used: bool,
    /// True if the whole distribution SAGA transaction reached
    /// `TransactionState::Completed`; false if any step failed and the
    /// transaction was compensated. All-or-nothing, not partial credit for
    /// a subset of steps succeeding.
    pub success: bool,
}

/// Running counters for a distributor's lifetime, with derived rates.
#[derive(Debug, Default)]
pub struct DistributionStats {
    total_processed: AtomicU64,
    successful_distributions: AtomicU64,
    failed_distributions: AtomicU64,
    fallback_used: AtomicU64,
}

/// An immutable snapshot of [`DistributionStats`] at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionStatsSnapshot {
    /// Total results submitted to `distribute`.
    pub total_processed: u64,
    /// Results whose distribution transaction completed in full.
    pub successful_distributions: u64,
    /// Results whose distribution transaction failed and was compensated.
    pub failed_distributions: u64,
    /// Results where at least one target used a fallback store.
    pub fallback_used: u64,
    /// `successful_distributions / total_processed`, or `0.0` if none processed.
    pub success_rate: f64,
    /// `fallback_used / total_processed`, or `0.0` if none processed.
    pub fallback_rate: f64,
}

impl DistributionStats {
    pub(crate) fn record(&self, outcome: &DistributionOutcome) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        if outcome.success {
            self.successful_distributions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_distributions.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.fallback_used {
            self.fallback_used.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A point-in-time snapshot with derived rates.
    #[must_use]
    pub fn snapshot(&self) -> DistributionStatsSnapshot {
        let total = self.total_processed.load(Ordering::Relaxed);
        let successful = self.successful_distributions.load(Ordering::Relaxed);
        let failed = self.failed_distributions.load(Ordering::Relaxed);
        let fallback = self.fallback_used.load(Ordering::Relaxed);
        DistributionStatsSnapshot {
            total_processed: total,
            successful_distributions: successful,
            failed_distributions: failed,
            fallback_used: fallback,
            success_rate: if total == 0 { 0.0 } else { successful as f64 / total as f64 },
            fallback_rate: if total == 0 { 0.0 } else { fallback as f64 / total as f64 },
        }
    }
}
