//! # Bastion Core
//!
//! The domain layer of Bastion: request tiers, lockout policy, error budget
//! tracking and quality scoring. Backends are reached only through the
//! traits in [`ports`]; this crate performs no I/O.

pub mod domain;
pub mod error;
pub mod ports;
pub mod telemetry;

pub use error::DomainError;
