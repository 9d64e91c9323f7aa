//! # Bastion Shared
//!
//! Wire types exchanged over the HTTP API: request/response DTOs and the
//! RFC 7807 error body.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
