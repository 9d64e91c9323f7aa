//! # Bastion Infrastructure
//!
//! Concrete implementations of the ports defined in `bastion-core`, and the
//! admission components built on them.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external coordination store, in-process state only
//! - `redis` - Redis-backed coordination store shared across instances

pub mod auth;
pub mod governance;
pub mod store;

// Re-exports - In-Memory
pub use auth::InMemoryDirectory;
pub use governance::{LockoutConfig, LockoutGuard, RateLimitConfig, TieredRateLimiter};
pub use store::InMemoryStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
