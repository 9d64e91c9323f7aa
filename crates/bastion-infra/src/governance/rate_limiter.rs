//! Tiered sliding-window rate limiter.

use std::sync::Arc;
use std::time::Duration;

use bastion_core::domain::{Admission, Tier, TierQuotas};
use bastion_core::ports::GovernanceStore;

use super::{DEFAULT_STORE_TIMEOUT, store_timeout_from_env, try_shared};
use crate::store::InMemoryStore;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Per-tier quotas and window length
    pub quotas: TierQuotas,
    /// Key prefix for window keys
    pub key_prefix: String,
    /// Bound on each shared store call
    pub store_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quotas: TierQuotas::default(),
            key_prefix: "rate_limit".to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = TierQuotas::default();
        let quota = |name: &str, default: u32| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &u32| n > 0)
                .unwrap_or(default)
        };

        Self {
            quotas: TierQuotas {
                auth: quota("RATE_LIMIT_AUTH_PER_MIN", defaults.auth),
                write: quota("RATE_LIMIT_WRITE_PER_MIN", defaults.write),
                global: quota("RATE_LIMIT_GLOBAL_PER_MIN", defaults.global),
                window: Duration::from_secs(
                    std::env::var("RATE_LIMIT_WINDOW_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .filter(|&n: &u64| n > 0)
                        .unwrap_or(defaults.window.as_secs()),
                ),
            },
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "rate_limit".to_string()),
            store_timeout: store_timeout_from_env(),
        }
    }
}

/// Per-tier, per-client sliding-window admission.
///
/// Uses the shared store when one is configured and reachable; otherwise the
/// window lives in this process only.
pub struct TieredRateLimiter {
    shared: Option<Arc<dyn GovernanceStore>>,
    local: Arc<InMemoryStore>,
    config: RateLimitConfig,
}

impl TieredRateLimiter {
    pub fn new(
        config: RateLimitConfig,
        shared: Option<Arc<dyn GovernanceStore>>,
        local: Arc<InMemoryStore>,
    ) -> Self {
        Self {
            shared,
            local,
            config,
        }
    }

    /// In-process only limiter.
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, None, Arc::new(InMemoryStore::new()))
    }

    pub fn quotas(&self) -> &TierQuotas {
        &self.config.quotas
    }

    /// Classify the request and check it against its tier's window.
    pub async fn admit(&self, method: &str, path: &str, client_id: &str) -> Admission {
        self.admit_tier(Tier::classify(method, path), client_id).await
    }

    /// Single-shot admission check for an already classified request.
    pub async fn admit_tier(&self, tier: Tier, client_id: &str) -> Admission {
        let limit = self.config.quotas.limit_for(tier);
        let window = self.config.quotas.window;
        let key = format!("{}:{}:{}", self.config.key_prefix, tier, client_id);

        let shared = match &self.shared {
            Some(store) => {
                try_shared(
                    "window_admit",
                    self.config.store_timeout,
                    store.window_admit(&key, limit, window),
                )
                .await
            }
            None => None,
        };

        let decision = match shared {
            Some(decision) => decision,
            None => self.local.admit(&key, limit, window).await,
        };

        let admission = Admission::from_decision(tier, limit, decision);
        if !admission.allowed {
            tracing::debug!(tier = %tier, client = %client_id, limit, "Rate limit exceeded");
        }
        admission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::test_support::{FailingStore, StalledStore};

    #[tokio::test]
    async fn test_tier_quotas_are_enforced() {
        let limiter = TieredRateLimiter::in_memory(RateLimitConfig::default());

        for (tier, quota) in [(Tier::Auth, 10), (Tier::Write, 30), (Tier::Global, 100)] {
            let mut admitted = 0;
            for _ in 0..quota + 25 {
                if limiter.admit_tier(tier, "10.0.0.1").await.allowed {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, quota, "tier {tier}");
        }
    }

    #[tokio::test]
    async fn test_admission_metadata() {
        let limiter = TieredRateLimiter::in_memory(RateLimitConfig::default());

        let first = limiter.admit("POST", "/api/auth/login", "10.0.0.2").await;
        assert!(first.allowed);
        assert_eq!(first.tier, Tier::Auth);
        assert_eq!(first.limit, 10);
        assert_eq!(first.remaining, 9);

        for _ in 0..9 {
            limiter.admit("POST", "/api/auth/login", "10.0.0.2").await;
        }
        let denied = limiter.admit("POST", "/api/auth/login", "10.0.0.2").await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit, 10);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn test_clients_and_tiers_have_separate_windows() {
        let limiter = TieredRateLimiter::in_memory(RateLimitConfig::default());

        for _ in 0..10 {
            limiter.admit_tier(Tier::Auth, "a").await;
        }
        assert!(!limiter.admit_tier(Tier::Auth, "a").await.allowed);
        assert!(limiter.admit_tier(Tier::Auth, "b").await.allowed);
        assert!(limiter.admit_tier(Tier::Global, "a").await.allowed);
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_exceed_quota() {
        let limiter = Arc::new(TieredRateLimiter::in_memory(RateLimitConfig::default()));

        let handles: Vec<_> = (0..80)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit("PUT", "/api/items/1", "c").await.allowed })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 30);
    }

    #[tokio::test]
    async fn test_failing_store_falls_back_to_local_window() {
        let limiter = TieredRateLimiter::new(
            RateLimitConfig::default(),
            Some(Arc::new(FailingStore)),
            Arc::new(InMemoryStore::new()),
        );

        let mut admitted = 0;
        for _ in 0..15 {
            if limiter.admit_tier(Tier::Auth, "d").await.allowed {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let config = RateLimitConfig {
            store_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let limiter = TieredRateLimiter::new(
            config,
            Some(Arc::new(StalledStore)),
            Arc::new(InMemoryStore::new()),
        );

        let started = std::time::Instant::now();
        let admission = limiter.admit("GET", "/api/items", "e").await;
        assert!(admission.allowed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_short_window_slides() {
        let config = RateLimitConfig {
            quotas: TierQuotas {
                auth: 2,
                window: Duration::from_millis(100),
                ..Default::default()
            },
            ..Default::default()
        };
        let limiter = TieredRateLimiter::in_memory(config);

        assert!(limiter.admit_tier(Tier::Auth, "f").await.allowed);
        assert!(limiter.admit_tier(Tier::Auth, "f").await.allowed);
        assert!(!limiter.admit_tier(Tier::Auth, "f").await.allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.admit_tier(Tier::Auth, "f").await.allowed);
    }
}
