//! Weighted composite quality score and SLO breach evaluation.
//!
//! | Pillar         | Weight |
//! |----------------|--------|
//! | Security       | 0.40   |
//! | Data integrity | 0.20   |
//! | Reliability    | 0.15   |
//! | Auditability   | 0.15   |
//! | Performance    | 0.05   |
//!
//! Weights sum to 0.95; the remaining 0.05 is reserved. The composite divides
//! by the weight sum so a perfect score maps to exactly 1.0.

use serde::Serialize;

pub const SECURITY_WEIGHT: f64 = 0.40;
pub const DATA_INTEGRITY_WEIGHT: f64 = 0.20;
pub const RELIABILITY_WEIGHT: f64 = 0.15;
pub const AUDITABILITY_WEIGHT: f64 = 0.15;
pub const PERFORMANCE_WEIGHT: f64 = 0.05;
const WEIGHT_SUM: f64 = 0.95;

/// Minimum composite score for production readiness.
pub const PRODUCTION_GATE: f64 = 0.70;

/// Fixed SLO alert thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SloThresholds {
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    /// 5xx share of all requests, in percent.
    pub error_rate_pct: f64,
    /// 4xx share of all requests, in percent.
    pub client_error_pct: f64,
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            p95_latency_ms: 200.0,
            p99_latency_ms: 500.0,
            error_rate_pct: 0.1,
            client_error_pct: 5.0,
        }
    }
}

/// Runtime signals consumed by [`QualityScorer::calculate`].
///
/// Counts are signed so that malformed upstream values clamp instead of
/// wrapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityInputs {
    pub auth_checks_passed: i64,
    pub auth_checks_total: i64,
    pub audit_events_recorded: i64,
    pub audit_events_expected: i64,
    /// Observed availability, normally from a budget snapshot.
    pub availability: f64,
    pub logs_with_correlation_id: i64,
    pub total_logs: i64,
    pub observed_p95_ms: f64,
    pub observed_p99_ms: f64,
}

/// Five pillar scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScore {
    pub security: f64,
    pub data_integrity: f64,
    pub reliability: f64,
    pub auditability: f64,
    pub performance: f64,
}

/// One weighted pillar, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pillar {
    pub name: &'static str,
    pub score: f64,
    pub weight: f64,
}

impl QualityScore {
    /// Weighted composite normalized to `[0, 1]`.
    pub fn composite(&self) -> f64 {
        let raw = self.security * SECURITY_WEIGHT
            + self.data_integrity * DATA_INTEGRITY_WEIGHT
            + self.reliability * RELIABILITY_WEIGHT
            + self.auditability * AUDITABILITY_WEIGHT
            + self.performance * PERFORMANCE_WEIGHT;
        raw / WEIGHT_SUM
    }

    pub fn passes_gate(&self) -> bool {
        self.composite() >= PRODUCTION_GATE
    }

    pub fn pillars(&self) -> [Pillar; 5] {
        [
            Pillar {
                name: "security",
                score: self.security,
                weight: SECURITY_WEIGHT,
            },
            Pillar {
                name: "data_integrity",
                score: self.data_integrity,
                weight: DATA_INTEGRITY_WEIGHT,
            },
            Pillar {
                name: "reliability",
                score: self.reliability,
                weight: RELIABILITY_WEIGHT,
            },
            Pillar {
                name: "auditability",
                score: self.auditability,
                weight: AUDITABILITY_WEIGHT,
            },
            Pillar {
                name: "performance",
                score: self.performance,
                weight: PERFORMANCE_WEIGHT,
            },
        ]
    }
}

/// Independent SLO breach signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SloAlert {
    pub p95_latency_breached: bool,
    pub p99_latency_breached: bool,
    pub error_rate_breached: bool,
    pub client_error_spike: bool,
}

impl SloAlert {
    pub fn any_breach(&self) -> bool {
        self.p95_latency_breached
            || self.p99_latency_breached
            || self.error_rate_breached
            || self.client_error_spike
    }
}

/// Computes quality scores and SLO alerts from runtime signals.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    thresholds: SloThresholds,
    /// P95 at which the performance pillar reaches zero.
    latency_ceiling_ms: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(SloThresholds::default())
    }
}

impl QualityScorer {
    pub fn new(thresholds: SloThresholds) -> Self {
        Self {
            thresholds,
            latency_ceiling_ms: 500.0,
        }
    }

    pub fn calculate(&self, inputs: &QualityInputs) -> QualityScore {
        QualityScore {
            security: ratio(inputs.auth_checks_passed, inputs.auth_checks_total),
            data_integrity: ratio(inputs.audit_events_recorded, inputs.audit_events_expected),
            reliability: clamp01(inputs.availability),
            auditability: ratio(inputs.logs_with_correlation_id, inputs.total_logs),
            performance: self.latency_score(inputs.observed_p95_ms),
        }
    }

    pub fn evaluate_slo(
        &self,
        failed: u64,
        client_errors: u64,
        total: u64,
        observed_p95_ms: f64,
        observed_p99_ms: f64,
    ) -> SloAlert {
        let (error_rate_pct, client_error_pct) = if total > 0 {
            (
                failed as f64 / total as f64 * 100.0,
                client_errors as f64 / total as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        SloAlert {
            p95_latency_breached: observed_p95_ms > self.thresholds.p95_latency_ms,
            p99_latency_breached: observed_p99_ms > self.thresholds.p99_latency_ms,
            error_rate_breached: error_rate_pct > self.thresholds.error_rate_pct,
            client_error_spike: client_error_pct > self.thresholds.client_error_pct,
        }
    }

    // Linear decay: 1.0 at 0ms, 0.0 at the ceiling and beyond.
    fn latency_score(&self, observed_ms: f64) -> f64 {
        if self.latency_ceiling_ms <= 0.0 {
            return 1.0;
        }
        clamp01(1.0 - observed_ms / self.latency_ceiling_ms)
    }
}

/// No data counts as perfect, so a fresh process does not report false alarms.
fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 1.0;
    }
    clamp01(numerator as f64 / denominator as f64)
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
