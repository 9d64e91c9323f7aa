//! Correlation ID middleware - one ID per request, shared with the client.

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation ID, in both directions.
pub static CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Longest client-supplied ID accepted as-is.
const MAX_CLIENT_ID_LEN: usize = 128;

/// Reuses a well-formed client `X-Correlation-ID` or generates one, stores it
/// in request extensions, attaches it to the request span and echoes it on
/// the response.
pub struct CorrelationIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorrelationIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CorrelationIdService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdService { service }))
    }
}

pub struct CorrelationIdService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdService<S>
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
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| is_acceptable(v))
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        req.extensions_mut()
            .insert(CorrelationId(correlation_id.clone()));

        let span = tracing::info_span!("request", correlation_id = %correlation_id);
        let fut = self.service.call(req);

        Box::pin(
            async move {
                let mut res = fut.await?;

                if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                    res.headers_mut()
                        .insert(HeaderName::from_static("x-correlation-id"), value);
                }
                Ok(res)
            }
            .instrument(span),
        )
    }
}

fn is_acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CLIENT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}

/// Correlation ID extractor for handlers.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl actix_web::FromRequest for CorrelationId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(correlation_id_of(req)))
    }
}

/// ID assigned by the middleware; a fresh one outside of it.
fn correlation_id_of(req: &actix_web::HttpRequest) -> CorrelationId {
    req.extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(|| CorrelationId(Uuid::new_v4().to_string()))
}
