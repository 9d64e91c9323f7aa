//! Outcome recording middleware - feeds the error budget, latency signals
//! and request metrics.

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bastion_core::telemetry::OutcomeTracker;

use crate::observability::{CorrelationId, RequestMetrics, RuntimeSignals, UNMATCHED_ENDPOINT};

/// Records every final status (including errors raised by inner services)
/// into the [`OutcomeTracker`], latency into [`RuntimeSignals`], and both
/// into [`RequestMetrics`].
pub struct OutcomeMiddleware {
    outcomes: Arc<OutcomeTracker>,
    signals: Arc<RuntimeSignals>,
    metrics: Arc<RequestMetrics>,
}

impl OutcomeMiddleware {
    pub fn new(
        outcomes: Arc<OutcomeTracker>,
        signals: Arc<RuntimeSignals>,
        metrics: Arc<RequestMetrics>,
    ) -> Self {
        Self {
            outcomes,
            signals,
            metrics,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OutcomeMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = OutcomeService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OutcomeService {
            service,
            outcomes: self.outcomes.clone(),
            signals: self.signals.clone(),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct OutcomeService<S> {
    service: S,
    outcomes: Arc<OutcomeTracker>,
    signals: Arc<RuntimeSignals>,
    metrics: Arc<RequestMetrics>,
}

impl<S, B> Service<ServiceRequest> for OutcomeService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let outcomes = self.outcomes.clone();
        let signals = self.signals.clone();
        let metrics = self.metrics.clone();
        signals.record_request(req.extensions().contains::<CorrelationId>());
        let method = req.method().to_string();

        let started = Instant::now();
        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let elapsed = started.elapsed();

            // Route patterns are only known once the router has run.
            let (status, endpoint) = match &result {
                Ok(res) => (res.status(), res.request().match_pattern()),
                Err(e) => (e.as_response_error().status_code(), None),
            };
            outcomes.record(status.as_u16());
            signals.record_latency(elapsed);
            metrics.observe(
                &method,
                endpoint.as_deref().unwrap_or(UNMATCHED_ENDPOINT),
                status.as_u16(),
                elapsed,
            );

            let mut res = result?;
            let millis = format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0);
            if let Ok(value) = HeaderValue::from_str(&millis) {
                res.headers_mut()
                    .insert(HeaderName::from_static("x-response-time"), value);
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, error, test, web};

    use crate::observability::CorrelationIdMiddleware;

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn missing() -> HttpResponse {
        HttpResponse::NotFound().finish()
    }

    async fn broken() -> Result<HttpResponse, actix_web::Error> {
        Err(error::ErrorServiceUnavailable("down"))
    }

    #[actix_web::test]
    async fn test_records_statuses_and_errors() {
        let outcomes = Arc::new(OutcomeTracker::new(0.999));
        let signals = Arc::new(RuntimeSignals::new());
        let metrics = Arc::new(RequestMetrics::new().unwrap());
        let app = test::init_service(
            App::new()
                .wrap(OutcomeMiddleware::new(
                    outcomes.clone(),
                    signals.clone(),
                    metrics.clone(),
                ))
                .wrap(CorrelationIdMiddleware)
                .route("/ok", web::get().to(ok))
                .route("/missing", web::get().to(missing))
                .route("/broken", web::get().to(broken)),
        )
        .await;

        for uri in ["/ok", "/ok", "/missing", "/broken"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert!(res.headers().contains_key("X-Response-Time"));
        }

        let snapshot = outcomes.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.client_errors, 1);

        let inputs = signals.quality_inputs(&snapshot);
        assert_eq!(inputs.total_logs, 4);
        assert_eq!(inputs.logs_with_correlation_id, 4);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"endpoint="/ok""#));
        assert!(text.contains(r#"http_errors_total{error_class="4xx"} 1"#));
        assert!(text.contains(r#"http_errors_total{error_class="5xx"} 1"#));
    }

    #[actix_web::test]
    async fn test_unrouted_paths_share_one_endpoint_label() {
        let metrics = Arc::new(RequestMetrics::new().unwrap());
        let app = test::init_service(
            App::new()
                .wrap(OutcomeMiddleware::new(
                    Arc::new(OutcomeTracker::new(0.999)),
                    Arc::new(RuntimeSignals::new()),
                    metrics.clone(),
                ))
                .route("/ok", web::get().to(ok)),
        )
        .await;

        for uri in ["/nope-1", "/nope-2", "/nope-3"] {
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        }

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"endpoint="unmatched""#));
        assert!(!text.contains("/nope-1"));
    }
}
