//! Rate limiting middleware.

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use bastion_shared::ErrorResponse;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use bastion_core::domain::Admission;
use bastion_infra::TieredRateLimiter;

use crate::observability::CorrelationId;

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<TieredRateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<TieredRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<TieredRateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            // Peer address only; forwarding headers are client controlled.
            let client_id = req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            let admission = limiter
                .admit(req.method().as_str(), req.path(), &client_id)
                .await;

            if !admission.allowed {
                tracing::warn!(
                    tier = %admission.tier,
                    client = %client_id,
                    path = %req.path(),
                    "Rate limit exceeded"
                );

                let window_secs = limiter.quotas().window.as_secs().max(1);
                let mut error =
                    ErrorResponse::rate_limited(admission.tier.as_str(), admission.limit, window_secs);
                if let Some(id) = req.extensions().get::<CorrelationId>() {
                    error = error.with_correlation_id(id.as_str());
                }

                let mut response = HttpResponse::TooManyRequests()
                    .insert_header(("Retry-After", window_secs.to_string()))
                    .json(error);
                set_quota_headers(response.headers_mut(), &admission);

                let (http_req, _payload) = req.into_parts();
                return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            set_quota_headers(res.headers_mut(), &admission);
            Ok(res.map_into_left_body())
        })
    }
}

fn set_quota_headers(headers: &mut actix_web::http::header::HeaderMap, admission: &Admission) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(admission.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(admission.remaining),
    );
}
