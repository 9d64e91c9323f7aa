//! Health, readiness and SLA governance endpoints.

use actix_web::{HttpRequest, HttpResponse, web};

use bastion_core::telemetry::{BudgetSnapshot, QualityScore, SloAlert};
use bastion_shared::dto::{
    BudgetReport, CoordinationStatus, DetailedHealthResponse, HealthResponse, PillarReport,
    QualityReport, ReadinessResponse, SloReport,
};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Header carrying the operator key.
pub const OPS_KEY_HEADER: &str = "X-Ops-Key";

/// Liveness - the process is up.
///
/// GET /api/health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness - reports the coordination backend.
///
/// A configured Redis that errors or does not answer within the store
/// timeout reports `degraded` with 503; admission keeps working on
/// in-process state meanwhile.
///
/// GET /api/health/ready
pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let backend = state.coordination.backend().to_string();

    let (reachable, latency_ms) = match state.coordination.ping(state.coordination_timeout).await {
        None => (true, None),
        Some(Ok(latency)) => (true, Some(latency.as_millis() as u64)),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Coordination store ping failed");
            (false, None)
        }
    };

    let body = ReadinessResponse {
        status: if reachable { "ready" } else { "degraded" }.to_string(),
        coordination: CoordinationStatus {
            backend,
            reachable,
            latency_ms,
        },
    };

    if reachable {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Error budget, SLO alerts and quality score.
///
/// GET /api/health/detail
pub async fn detailed(req: HttpRequest, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    authorize_ops(&req, &state)?;

    let budget = state.outcomes.snapshot();
    let (p95, p99) = state.signals.latency_percentiles();
    let alert = state.scorer.evaluate_slo(
        budget.failed_requests,
        budget.client_errors,
        budget.total_requests,
        p95,
        p99,
    );
    let score = state.scorer.calculate(&state.signals.quality_inputs(&budget));

    let status = if budget.budget_exhausted || alert.any_breach() {
        "degraded"
    } else {
        "ok"
    };

    Ok(HttpResponse::Ok().json(DetailedHealthResponse {
        status: status.to_string(),
        budget: budget_report(&budget),
        slo: slo_report(&alert, p95, p99),
        quality: quality_report(&score),
    }))
}

/// Start a new SLA window: zero the budget and runtime signals.
///
/// POST /api/health/budget/reset
pub async fn reset_budget(req: HttpRequest, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    authorize_ops(&req, &state)?;

    state.outcomes.reset();
    state.signals.reset();
    tracing::info!(target: "audit", action = "budget.reset", "Error budget reset");

    Ok(HttpResponse::Ok().json(budget_report(&state.outcomes.snapshot())))
}

fn authorize_ops(req: &HttpRequest, state: &AppState) -> AppResult<()> {
    let Some(expected) = state.ops_api_key.as_deref() else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(OPS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        tracing::warn!(path = %req.path(), "Operator endpoint called without a valid key");
        Err(AppError::Forbidden)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn budget_report(b: &BudgetSnapshot) -> BudgetReport {
    BudgetReport {
        sla_target: b.sla_target,
        total_requests: b.total_requests,
        failed_requests: b.failed_requests,
        client_errors: b.client_errors,
        observed_availability: b.observed_availability,
        budget_consumed_pct: b.budget_consumed_pct,
        budget_exhausted: b.budget_exhausted,
    }
}

fn slo_report(alert: &SloAlert, p95: f64, p99: f64) -> SloReport {
    SloReport {
        p95_latency_ms: p95,
        p99_latency_ms: p99,
        p95_latency_breached: alert.p95_latency_breached,
        p99_latency_breached: alert.p99_latency_breached,
        error_rate_breached: alert.error_rate_breached,
        client_error_spike: alert.client_error_spike,
        any_breach: alert.any_breach(),
    }
}

fn quality_report(score: &QualityScore) -> QualityReport {
    QualityReport {
        composite: score.composite(),
        passes_gate: score.passes_gate(),
        pillars: score
            .pillars()
            .iter()
            .map(|p| PillarReport {
                name: p.name.to_string(),
                score: p.score,
                weight: p.weight,
            })
            .collect(),
    }
}
