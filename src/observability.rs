use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Approval workflow counters
#[derive(Debug, Default)]
pub struct ApprovalMetrics {
    pub advances: AtomicU64,
    pub finalizations: AtomicU64,
    pub rejections: AtomicU64,
    pub denials: AtomicU64,
    pub position_fallbacks: AtomicU64,
    pub conflicts: AtomicU64,
}

impl ApprovalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalization(&self) {
        self.finalizations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denial(&self) {
        self.denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_position_fallback(&self) {
        self.position_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
        warn!("Approval step commit lost an optimistic concurrency race");
    }

    pub fn get_stats(&self) -> ApprovalStats {
        ApprovalStats {
            advances: self.advances.load(Ordering::Relaxed),
            finalizations: self.finalizations.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
            position_fallbacks: self.position_fallbacks.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            advances = stats.advances,
            finalizations = stats.finalizations,
            rejections = stats.rejections,
            denials = stats.denials,
            position_fallbacks = stats.position_fallbacks,
            conflicts = stats.conflicts,
            "Approval metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApprovalStats {
    pub advances: u64,
    pub finalizations: u64,
    pub rejections: u64,
    pub denials: u64,
    pub position_fallbacks: u64,
    pub conflicts: u64,
}

/// Process-wide metrics instance
static APPROVAL_METRICS: std::sync::LazyLock<ApprovalMetrics> =
    std::sync::LazyLock::new(ApprovalMetrics::new);

pub fn approval_metrics() -> &'static ApprovalMetrics {
    &APPROVAL_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
