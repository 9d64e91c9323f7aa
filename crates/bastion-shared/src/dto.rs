//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub account_id: Uuid,
    pub email: String,
    /// RFC 3339
    pub authenticated_at: String,
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Readiness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// `ready` or `degraded`
    pub status: String,
    pub coordination: CoordinationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationStatus {
    /// `redis` or `memory`
    pub backend: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Error budget over the current SLA window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetReport {
    pub sla_target: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub client_errors: u64,
    pub observed_availability: f64,
    pub budget_consumed_pct: f64,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloReport {
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub p95_latency_breached: bool,
    pub p99_latency_breached: bool,
    pub error_rate_breached: bool,
    pub client_error_spike: bool,
    pub any_breach: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarReport {
    pub name: String,
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub composite: f64,
    pub passes_gate: bool,
    pub pillars: Vec<PillarReport>,
}

/// Operator view: budget, SLO alerts and quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub budget: BudgetReport,
    pub slo: SloReport,
    pub quality: QualityReport,
}
