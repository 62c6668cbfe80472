//! Evaluation metrics

use rescue_alert_core::ReasonCode;
use rescue_alert_policy::Decision;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector for policy evaluations
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    evaluations: AtomicU64,
    ambiguous_evaluations: AtomicU64,
    eligible_channels: AtomicU64,
    suppressions: [AtomicU64; ReasonCode::ALL.len()],
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                evaluations: AtomicU64::new(0),
                ambiguous_evaluations: AtomicU64::new(0),
                eligible_channels: AtomicU64::new(0),
                suppressions: Default::default(),
            }),
        }
    }

    /// Record everything a decision carries
    pub fn record_decision(&self, decision: &Decision) {
        self.record_evaluation(decision.ambiguous);
        self.record_eligible(decision.eligible_channels.len() as u64);
        for (_, reason) in decision.suppressions() {
            self.record_suppression(reason);
        }
    }

    /// Record an evaluation call
    pub fn record_evaluation(&self, ambiguous: bool) {
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
        if ambiguous {
            self.inner.ambiguous_evaluations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eligible(&self, count: u64) {
        self.inner.eligible_channels.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one suppressed channel
    pub fn record_suppression(&self, reason: ReasonCode) {
        self.inner.suppressions[reason as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let suppressions = ReasonCode::ALL
            .iter()
            .map(|code| (*code, self.inner.suppressions[*code as usize].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        MetricsSnapshot {
            evaluations: self.inner.evaluations.load(Ordering::Relaxed),
            ambiguous_evaluations: self.inner.ambiguous_evaluations.load(Ordering::Relaxed),
            eligible_channels: self.inner.eligible_channels.load(Ordering::Relaxed),
            suppressions,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub evaluations: u64,
    pub ambiguous_evaluations: u64,
    pub eligible_channels: u64,
    /// Suppressed channel count per reason; reasons never seen are absent
    pub suppressions: BTreeMap<ReasonCode, u64>,
}

impl MetricsSnapshot {
    pub fn total_suppressions(&self) -> u64 {
        self.suppressions.values().sum()
    }

    pub fn suppressions_for(&self, reason: ReasonCode) -> u64 {
        self.suppressions.get(&reason).copied().unwrap_or(0)
    }

    /// Share of decided channels that were suppressed
    pub fn suppression_rate(&self) -> f64 {
        let suppressed = self.total_suppressions();
        let total = suppressed + self.eligible_channels;
        if total == 0 {
            0.0
        } else {
            suppressed as f64 / total as f64
        }
    }

    /// Share of evaluations that failed closed on an ambiguous request
    pub fn ambiguity_rate(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.ambiguous_evaluations as f64 / self.evaluations as f64
        }
    }
}
