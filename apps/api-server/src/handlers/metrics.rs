//! Prometheus scrape endpoint.

use actix_web::{HttpResponse, web};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /metrics
pub async fn scrape(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use std::sync::Arc;

    use bastion_infra::InMemoryDirectory;

    use crate::config::AppConfig;
    use crate::middleware::OutcomeMiddleware;
    use crate::state::Coordination;

    #[actix_web::test]
    async fn test_scrape_reports_served_requests() {
        let directory = InMemoryDirectory::new().await.unwrap();
        let state =
            AppState::assemble(&AppConfig::default(), Coordination::InProcess, Arc::new(directory))
                .unwrap();
        let app = test::init_service(
            App::new()
                .wrap(OutcomeMiddleware::new(
                    state.outcomes.clone(),
                    state.signals.clone(),
                    state.metrics.clone(),
                ))
                .app_data(web::Data::new(state))
                .configure(crate::handlers::configure_routes),
        )
        .await;

        for _ in 0..2 {
            test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
        }
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(serde_json::json!({ "email": "nobody@example.com", "password": "wrong" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(
            res.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("text/plain"))
        );

        let body = test::read_body(res).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains(r#"endpoint="/api/health""#));
        assert!(text.contains(r#"status_code="200""#));
        assert!(text.contains(r#"endpoint="/api/auth/login""#));
        assert!(text.contains(r#"http_errors_total{error_class="4xx"} 1"#));
        assert!(text.contains("http_request_duration_seconds_bucket"));
    }
}
