//! Admission components - tiered rate limiting and lockout protection.
//!
//! Both components hold an optional shared [`GovernanceStore`] and an
//! in-process [`InMemoryStore`]. Each call tries the shared store under a
//! short timeout and falls back to in-process state on any error, so an
//! outage of the shared store reduces protection to per-instance accounting
//! instead of rejecting or stalling requests.

mod lockout;
mod rate_limiter;

pub use lockout::{LockoutConfig, LockoutGuard};
pub use rate_limiter::{RateLimitConfig, TieredRateLimiter};

use std::future::Future;
use std::time::Duration;

use bastion_core::ports::StoreError;

/// Default bound on a single coordination store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(300);

pub(crate) fn store_timeout_from_env() -> Duration {
    Duration::from_millis(
        std::env::var("COORDINATION_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n: &u64| n > 0)
            .unwrap_or(DEFAULT_STORE_TIMEOUT.as_millis() as u64),
    )
}

/// A whole number of seconds; zero and garbage are rejected.
pub(crate) fn positive_secs(raw: Option<&str>) -> Option<Duration> {
    raw.and_then(|s| s.trim().parse().ok())
        .filter(|&n: &u64| n > 0)
        .map(Duration::from_secs)
}

/// Run one shared-store operation under `timeout`.
///
/// Returns `None` on error or timeout; the caller then uses in-process state.
/// Never retries.
pub(crate) async fn try_shared<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(
                operation,
                error = %e,
                "Coordination store failed, using in-process state"
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                operation,
                error = %StoreError::Timeout(timeout),
                "Coordination store timed out, using in-process state"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_secs_rejects_zero() {
        assert_eq!(positive_secs(Some("900")), Some(Duration::from_secs(900)));
        assert_eq!(positive_secs(Some("0")), None);
        assert_eq!(positive_secs(Some("-5")), None);
        assert_eq!(positive_secs(None), None);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Store doubles for exercising the fallback paths.

    use std::time::Duration;

    use async_trait::async_trait;
    use bastion_core::domain::{FailureOutcome, LockoutPolicy, WindowDecision};
    use bastion_core::ports::{GovernanceStore, StoreError};

    /// Fails every operation immediately.
    pub struct FailingStore;

    #[async_trait]
    impl GovernanceStore for FailingStore {
        async fn window_admit(&self, _: &str, _: u32, _: Duration) -> Result<WindowDecision, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn lockout_check(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn lockout_record(&self, _: &str, _: &LockoutPolicy) -> Result<FailureOutcome, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn lockout_clear(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    /// Sleeps far beyond any store timeout before answering.
    pub struct StalledStore;

    #[async_trait]
    impl GovernanceStore for StalledStore {
        async fn window_admit(&self, _: &str, _: u32, _: Duration) -> Result<WindowDecision, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(WindowDecision { allowed: false, count: 0 })
        }

        async fn lockout_check(&self, _: &str) -> Result<bool, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }

        async fn lockout_record(&self, _: &str, _: &LockoutPolicy) -> Result<FailureOutcome, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(FailureOutcome::locked())
        }

        async fn lockout_clear(&self, _: &str) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "stalled"
        }
    }
}
