//! HTTP handlers and route configuration.

mod auth;
mod health;
mod metrics;

use actix_web::web;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics::scrape));
    cfg.service(
        web::scope("/api")
            // Malformed bodies get the same problem+json shape as other errors
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .service(
                web::scope("/health")
                    .route("", web::get().to(health::health_check))
                    .route("/ready", web::get().to(health::readiness))
                    .route("/detail", web::get().to(health::detailed))
                    .route("/budget/reset", web::post().to(health::reset_budget)),
            )
            .service(web::scope("/auth").route("/login", web::post().to(auth::login))),
    );
}
