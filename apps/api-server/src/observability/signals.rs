//! Runtime signals feeding the quality scorer and SLO evaluation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bastion_core::telemetry::{BudgetSnapshot, QualityInputs};

/// Latency samples kept for percentile estimation.
const LATENCY_SAMPLES: usize = 2048;

/// Counters and latency samples collected by the middleware stack and the
/// audit trail. Reset together with the error budget.
#[derive(Debug, Default)]
pub struct RuntimeSignals {
    latencies: Mutex<VecDeque<f64>>,
    requests: AtomicU64,
    correlated: AtomicU64,
    audit_expected: AtomicU64,
    audit_recorded: AtomicU64,
}

impl RuntimeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request; `correlated` when it carries a correlation id.
    pub fn record_request(&self, correlated: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if correlated {
            self.correlated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_latency(&self, elapsed: Duration) {
        let mut samples = self.latencies.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn audit_expected(&self) {
        self.audit_expected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn audit_recorded(&self) {
        self.audit_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// `(p95, p99)` in milliseconds over the retained samples; zero when empty.
    pub fn latency_percentiles(&self) -> (f64, f64) {
        let mut samples: Vec<f64> = self
            .latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        samples.sort_by(f64::total_cmp);

        (percentile(&samples, 0.95), percentile(&samples, 0.99))
    }

    /// Scorer inputs for the current window.
    ///
    /// Security counts a request as passing its access checks unless it ended
    /// in a server error.
    pub fn quality_inputs(&self, budget: &BudgetSnapshot) -> QualityInputs {
        let (p95, p99) = self.latency_percentiles();
        let total = to_i64(budget.total_requests);

        QualityInputs {
            auth_checks_passed: total - to_i64(budget.failed_requests),
            auth_checks_total: total,
            audit_events_recorded: to_i64(self.audit_recorded.load(Ordering::Relaxed)),
            audit_events_expected: to_i64(self.audit_expected.load(Ordering::Relaxed)),
            availability: budget.observed_availability,
            logs_with_correlation_id: to_i64(self.correlated.load(Ordering::Relaxed)),
            total_logs: to_i64(self.requests.load(Ordering::Relaxed)),
            observed_p95_ms: p95,
            observed_p99_ms: p99,
        }
    }

    pub fn reset(&self) {
        self.latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.requests.store(0, Ordering::Relaxed);
        self.correlated.store(0, Ordering::Relaxed);
        self.audit_expected.store(0, Ordering::Relaxed);
        self.audit_recorded.store(0, Ordering::Relaxed);
    }
}

// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
