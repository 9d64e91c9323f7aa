//! # Bastion API Server
//!
//! Actix-web host for the admission and SLA governance components.
//!
//! Middleware order, outermost first: request tracing, correlation ID,
//! outcome recording, rate limiting.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::{OutcomeMiddleware, RateLimitMiddleware};
use observability::CorrelationIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Bastion API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("invalid configuration: {e}")))?;

    #[cfg(feature = "scheduler")]
    let mut scheduler = start_scheduler(&config, &state).await;

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(RateLimitMiddleware::new(server_state.limiter.clone()))
            .wrap(OutcomeMiddleware::new(
                server_state.outcomes.clone(),
                server_state.signals.clone(),
                server_state.metrics.clone(),
            ))
            .wrap(CorrelationIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    {
        if let Some(scheduler) = scheduler.as_mut()
            && let Err(e) = scheduler.shutdown().await
        {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }

    result
}

/// Register maintenance jobs. A scheduler failure is logged and the server
/// runs without them.
#[cfg(feature = "scheduler")]
async fn start_scheduler(
    config: &AppConfig,
    state: &AppState,
) -> Option<background::Scheduler> {
    use background::{Scheduler, jobs};

    if !config.scheduler.enabled {
        tracing::info!("Scheduler disabled");
        return None;
    }

    let setup = async {
        let scheduler = Scheduler::new(config.scheduler.clone()).await?;
        let schedule = scheduler.config().maintenance_schedule.clone();

        let sweep_state = state.clone();
        scheduler
            .add_cron("sweep_local_state", &schedule, move || {
                let state = sweep_state.clone();
                async move {
                    jobs::sweep_local_state(&state).await;
                }
            })
            .await?;

        let slo_state = state.clone();
        scheduler
            .add_cron("evaluate_slo", &schedule, move || {
                let state = slo_state.clone();
                async move {
                    jobs::evaluate_slo(&state);
                }
            })
            .await?;

        scheduler.start().await?;
        Ok::<_, tokio_cron_scheduler::JobSchedulerError>(scheduler)
    };

    match setup.await {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start scheduler");
            None
        }
    }
}
