//! Middleware modules.

pub mod error;
pub mod outcome;
pub mod rate_limit;

pub use outcome::OutcomeMiddleware;
pub use rate_limit::RateLimitMiddleware;
