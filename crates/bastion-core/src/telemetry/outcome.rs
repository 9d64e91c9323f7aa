//! Error budget tracking.
//!
//! Counts request outcomes and derives how much of the SLA error budget has
//! been consumed. Counters are cumulative since the last [`OutcomeTracker::reset`];
//! the caller decides where SLA reporting windows begin.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of SLA health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSnapshot {
    pub sla_target: f64,
    pub total_requests: u64,
    /// 5xx responses - these consume the error budget.
    pub failed_requests: u64,
    /// 4xx responses - tracked separately, never consume budget.
    pub client_errors: u64,
    pub observed_availability: f64,
    pub budget_consumed_pct: f64,
    pub budget_exhausted: bool,
}

/// Lock-free request outcome counters.
#[derive(Debug)]
pub struct OutcomeTracker {
    sla_target: f64,
    total: AtomicU64,
    failed: AtomicU64,
    client_errors: AtomicU64,
}

impl OutcomeTracker {
    /// Create a tracker for an availability target such as `0.999`.
    ///
    /// Targets outside `[0, 1]` are clamped.
    pub fn new(sla_target: f64) -> Self {
        let sla_target = if sla_target.is_nan() {
            1.0
        } else {
            sla_target.clamp(0.0, 1.0)
        };

        Self {
            sla_target,
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
        }
    }

    pub fn sla_target(&self) -> f64 {
        self.sla_target
    }

    /// Classify one response status.
    pub fn record(&self, status: u16) {
        // total must be bumped before the class counter, see `snapshot`
        self.total.fetch_add(1, Ordering::SeqCst);
        match status {
            500..=u16::MAX => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        // Class counters first, total last: a concurrent `record` can only make
        // total larger than the classes we already saw.
        let failed = self.failed.load(Ordering::SeqCst);
        let client_errors = self.client_errors.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);

        // A concurrent `reset` may zero total after the classes were read.
        let failed = failed.min(total);
        let client_errors = client_errors.min(total - failed);

        if total == 0 {
            return BudgetSnapshot {
                sla_target: self.sla_target,
                total_requests: 0,
                failed_requests: 0,
                client_errors: 0,
                observed_availability: 1.0,
                budget_consumed_pct: 0.0,
                budget_exhausted: false,
            };
        }

        let availability = (total - failed) as f64 / total as f64;
        let allowed_rate = 1.0 - self.sla_target;

        let consumed = if allowed_rate > 0.0 {
            let raw = failed as f64 / total as f64 / allowed_rate * 100.0;
            round_to(raw, 3).min(100.0)
        } else if failed > 0 {
            100.0
        } else {
            0.0
        };

        BudgetSnapshot {
            sla_target: self.sla_target,
            total_requests: total,
            failed_requests: failed,
            client_errors,
            observed_availability: round_to(availability, 6),
            budget_consumed_pct: consumed,
            budget_exhausted: consumed >= 100.0,
        }
    }

    /// Zero all counters, e.g. at the start of a new SLA window.
    pub fn reset(&self) {
        self.failed.store(0, Ordering::SeqCst);
        self.client_errors.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
