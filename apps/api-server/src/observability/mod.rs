//! Observability module - correlation IDs, runtime signals, request
//! metrics, audit trail and alerting.

mod alert;
pub mod audit;
mod correlation;
mod metrics;
mod signals;

pub use alert::{AlertConfig, AlertLayer};
pub use correlation::{CorrelationId, CorrelationIdMiddleware};
pub use metrics::{RequestMetrics, UNMATCHED_ENDPOINT};
pub use signals::RuntimeSignals;
