//! Periodic maintenance and SLO evaluation.

use bastion_core::telemetry::SloAlert;

use crate::state::AppState;

/// Drop idle in-process windows and expired lockout entries.
pub async fn sweep_local_state(state: &AppState) -> usize {
    let removed = state.local_store.sweep().await;
    if removed > 0 {
        tracing::debug!(removed, "Swept idle in-process admission state");
    }
    removed
}

/// Evaluate SLOs over the current window. Breaches are logged at ERROR,
/// which the alert layer forwards.
pub fn evaluate_slo(state: &AppState) -> SloAlert {
    let budget = state.outcomes.snapshot();
    let (p95, p99) = state.signals.latency_percentiles();
    let alert = state.scorer.evaluate_slo(
        budget.failed_requests,
        budget.client_errors,
        budget.total_requests,
        p95,
        p99,
    );

    if alert.any_breach() {
        tracing::error!(
            target: "slo",
            p95_ms = p95,
            p99_ms = p99,
            p95_breached = alert.p95_latency_breached,
            p99_breached = alert.p99_latency_breached,
            error_rate_breached = alert.error_rate_breached,
            client_error_spike = alert.client_error_spike,
            total_requests = budget.total_requests,
            "SLO breach detected"
        );
    }
    if budget.budget_exhausted {
        tracing::error!(
            target: "slo",
            sla_target = budget.sla_target,
            observed_availability = budget.observed_availability,
            "Error budget exhausted"
        );
    }

    alert
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use bastion_infra::InMemoryDirectory;

    use crate::config::AppConfig;
    use crate::state::Coordination;

    async fn state() -> AppState {
        let directory = InMemoryDirectory::new().await.unwrap();
        AppState::assemble(&AppConfig::default(), Coordination::InProcess, Arc::new(directory)).unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_slo_flags_breaches() {
        let state = state().await;
        assert!(!evaluate_slo(&state).any_breach());

        for _ in 0..90 {
            state.outcomes.record(200);
        }
        for _ in 0..10 {
            state.outcomes.record(404);
        }
        state.signals.record_latency(Duration::from_millis(800));

        let alert = evaluate_slo(&state);
        assert!(alert.client_error_spike);
        assert!(alert.p99_latency_breached);
        assert!(!alert.error_rate_breached);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_windows() {
        let state = state().await;
        state
            .local_store
            .admit("rate_limit:auth:x", 5, Duration::from_millis(10))
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sweep_local_state(&state).await, 1);
    }
}
