//! Failed-authentication lockout guard.
//!
//! Policy (defaults): 5 consecutive failures lock the identifier for 15
//! minutes; the counter restarts from zero once the lock is set. A successful
//! login clears both counter and lock.

use std::sync::Arc;
use std::time::Duration;

use bastion_core::domain::{FailureOutcome, LockoutPolicy, normalize_identifier};
use bastion_core::ports::GovernanceStore;

use super::{DEFAULT_STORE_TIMEOUT, positive_secs, store_timeout_from_env, try_shared};
use crate::store::InMemoryStore;

/// Lockout guard configuration.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    pub policy: LockoutPolicy,
    /// Bound on each shared store call
    pub store_timeout: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            policy: LockoutPolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl LockoutConfig {
    pub fn from_env() -> Self {
        let defaults = LockoutPolicy::default();

        Self {
            policy: LockoutPolicy {
                max_attempts: std::env::var("LOCKOUT_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|&n: &u32| n > 0)
                    .unwrap_or(defaults.max_attempts),
                lockout_duration: positive_secs(
                    std::env::var("LOCKOUT_DURATION_SECS").ok().as_deref(),
                )
                .unwrap_or(defaults.lockout_duration),
            },
            store_timeout: store_timeout_from_env(),
        }
    }
}

/// Tracks failed logins per account identifier.
///
/// Shared store errors are never surfaced: the guard falls back to its
/// in-process map, so a coordination outage cannot by itself lock anyone out.
pub struct LockoutGuard {
    shared: Option<Arc<dyn GovernanceStore>>,
    local: Arc<InMemoryStore>,
    config: LockoutConfig,
}

impl LockoutGuard {
    pub fn new(
        config: LockoutConfig,
        shared: Option<Arc<dyn GovernanceStore>>,
        local: Arc<InMemoryStore>,
    ) -> Self {
        Self {
            shared,
            local,
            config,
        }
    }

    /// In-process only guard.
    pub fn in_memory(config: LockoutConfig) -> Self {
        Self::new(config, None, Arc::new(InMemoryStore::new()))
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.config.policy
    }

    /// `false` iff the identifier currently holds an unexpired lock.
    pub async fn check(&self, identifier: &str) -> bool {
        let id = normalize_identifier(identifier);

        let shared = match &self.shared {
            Some(store) => {
                try_shared(
                    "lockout_check",
                    self.config.store_timeout,
                    store.lockout_check(&id),
                )
                .await
            }
            None => None,
        };

        let locked = match shared {
            Some(locked) => locked,
            None => self.local.is_locked(&id).await,
        };
        !locked
    }

    /// Count a failed attempt, locking the identifier at the threshold.
    pub async fn record_failure(&self, identifier: &str) -> FailureOutcome {
        let id = normalize_identifier(identifier);
        let policy = &self.config.policy;

        let shared = match &self.shared {
            Some(store) => {
                try_shared(
                    "lockout_record",
                    self.config.store_timeout,
                    store.lockout_record(&id, policy),
                )
                .await
            }
            None => None,
        };

        let outcome = match shared {
            Some(outcome) => outcome,
            None => self.local.record_failure(&id, policy).await,
        };

        if outcome.locked {
            tracing::warn!(
                identifier = %id,
                lockout_secs = policy.lockout_duration.as_secs(),
                "Identifier locked after repeated authentication failures"
            );
        } else {
            tracing::debug!(identifier = %id, failures = outcome.failures, "Authentication failure recorded");
        }
        outcome
    }

    /// Remove failure counter and lock on every backend.
    pub async fn clear(&self, identifier: &str) {
        let id = normalize_identifier(identifier);

        if let Some(store) = &self.shared {
            try_shared(
                "lockout_clear",
                self.config.store_timeout,
                store.lockout_clear(&id),
            )
            .await;
        }
        // Entries written here during an outage must not outlive a success
        self.local.clear(&id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::test_support::{FailingStore, StalledStore};

    const EMAIL: &str = "test@example.com";

    #[tokio::test]
    async fn test_allows_before_threshold() {
        let guard = LockoutGuard::in_memory(LockoutConfig::default());

        for _ in 0..4 {
            guard.record_failure(EMAIL).await;
        }
        assert!(guard.check(EMAIL).await);
    }

    #[tokio::test]
    async fn test_locks_after_five_failures() {
        let local = Arc::new(InMemoryStore::new());
        let guard = LockoutGuard::new(LockoutConfig::default(), None, local.clone());

        for _ in 0..4 {
            assert!(!guard.record_failure(EMAIL).await.locked);
        }
        let outcome = guard.record_failure(EMAIL).await;

        assert!(outcome.locked);
        assert_eq!(outcome.failures, 0);
        assert!(!guard.check(EMAIL).await);
        assert_eq!(local.failures(EMAIL).await, 0);
    }

    #[tokio::test]
    async fn test_clear_resets_lock() {
        let guard = LockoutGuard::in_memory(LockoutConfig::default());

        for _ in 0..5 {
            guard.record_failure(EMAIL).await;
        }
        guard.clear(EMAIL).await;
        assert!(guard.check(EMAIL).await);

        // counting starts over
        assert_eq!(guard.record_failure(EMAIL).await, FailureOutcome::counted(1));
    }

    #[tokio::test]
    async fn test_identifier_case_is_ignored() {
        let guard = LockoutGuard::in_memory(LockoutConfig::default());

        for variant in ["A@x.io", "a@x.io", " a@X.io", "A@X.IO", "a@x.io "] {
            guard.record_failure(variant).await;
        }
        assert!(!guard.check("a@x.io").await);
    }

    #[tokio::test]
    async fn test_unlocked_identifier_restarts_from_zero() {
        let config = LockoutConfig {
            policy: LockoutPolicy {
                max_attempts: 3,
                lockout_duration: Duration::from_millis(60),
            },
            ..Default::default()
        };
        let guard = LockoutGuard::in_memory(config);

        for _ in 0..3 {
            guard.record_failure(EMAIL).await;
        }
        assert!(!guard.check(EMAIL).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(guard.check(EMAIL).await);
        assert_eq!(guard.record_failure(EMAIL).await, FailureOutcome::counted(1));
    }

    #[tokio::test]
    async fn test_concurrent_failures_cross_threshold_once() {
        let guard = Arc::new(LockoutGuard::in_memory(LockoutConfig::default()));

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.record_failure(EMAIL).await.locked })
            })
            .collect();

        let mut locks = 0;
        for handle in handles {
            if handle.await.unwrap() {
                locks += 1;
            }
        }
        assert_eq!(locks, 1);
        assert!(!guard.check(EMAIL).await);
    }

    #[tokio::test]
    async fn test_store_outage_never_locks_by_itself() {
        let guard = LockoutGuard::new(
            LockoutConfig::default(),
            Some(Arc::new(FailingStore)),
            Arc::new(InMemoryStore::new()),
        );
        assert!(guard.check(EMAIL).await);

        let config = LockoutConfig {
            store_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let guard = LockoutGuard::new(config, Some(Arc::new(StalledStore)), Arc::new(InMemoryStore::new()));
        // the stalled store would answer "locked" if it were ever awaited
        assert!(guard.check(EMAIL).await);
        assert!(!guard.record_failure(EMAIL).await.locked);
    }

    #[tokio::test]
    async fn test_outage_failures_are_cleared_locally() {
        let guard = LockoutGuard::new(
            LockoutConfig::default(),
            Some(Arc::new(FailingStore)),
            Arc::new(InMemoryStore::new()),
        );

        for _ in 0..5 {
            guard.record_failure(EMAIL).await;
        }
        assert!(!guard.check(EMAIL).await);

        guard.clear(EMAIL).await;
        assert!(guard.check(EMAIL).await);
    }
}
