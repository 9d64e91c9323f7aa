//! Coordination store port.
//!
//! A single interface over the state the admission layer needs: sliding
//! windows for rate limiting and failure counters for lockouts. Implemented
//! by a shared backend (Redis) and by an in-process fallback.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{FailureOutcome, LockoutPolicy, WindowDecision};

/// Backend for admission state.
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Prune events older than `window`, then record one event if fewer than
    /// `limit` remain. Prune, count and insert must be atomic per key.
    async fn window_admit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<WindowDecision, StoreError>;

    /// Returns `true` while the identifier holds an unexpired lock.
    async fn lockout_check(&self, identifier: &str) -> Result<bool, StoreError>;

    /// Count one failure, locking the identifier when the policy threshold is
    /// reached. The threshold crossing must be observed exactly once.
    async fn lockout_record(
        &self,
        identifier: &str,
        policy: &LockoutPolicy,
    ) -> Result<FailureOutcome, StoreError>;

    /// Remove both the failure counter and any lock.
    async fn lockout_clear(&self, identifier: &str) -> Result<(), StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Coordination store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
