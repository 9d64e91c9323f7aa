//! Application state - shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Duration;

use bastion_core::DomainError;
use bastion_core::ports::{CredentialVerifier, GovernanceStore, StoreError};
use bastion_core::telemetry::{OutcomeTracker, QualityScorer};
use bastion_infra::{InMemoryDirectory, InMemoryStore, LockoutGuard, TieredRateLimiter};

#[cfg(feature = "redis")]
use bastion_infra::{RedisConfig, RedisStore};

use crate::config::AppConfig;
use crate::observability::{RequestMetrics, RuntimeSignals};

/// Where cross-instance admission state lives.
#[derive(Clone)]
pub enum Coordination {
    /// Per-instance accounting only.
    InProcess,
    #[cfg(feature = "redis")]
    Redis(Arc<RedisStore>),
}

impl Coordination {
    #[cfg(feature = "redis")]
    async fn connect(config: Option<&RedisConfig>) -> Self {
        let Some(config) = config else {
            tracing::warn!("REDIS_URL not set. Admission state is per instance.");
            return Self::InProcess;
        };

        match RedisStore::new(config.clone()).await {
            Ok(store) => Self::Redis(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable at startup. Admission state is per instance.");
                Self::InProcess
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn connect() -> Self {
        if std::env::var("REDIS_URL").is_ok() {
            tracing::warn!("REDIS_URL is set but the redis feature is disabled; ignoring it");
        }
        Self::InProcess
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::InProcess => "memory",
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.backend(),
        }
    }

    fn shared(&self) -> Option<Arc<dyn GovernanceStore>> {
        match self {
            Self::InProcess => None,
            #[cfg(feature = "redis")]
            Self::Redis(store) => Some(store.clone() as Arc<dyn GovernanceStore>),
        }
    }

    /// Round-trip to the shared store, bounded by `timeout`; `None` when
    /// there is none.
    #[cfg_attr(not(feature = "redis"), allow(unused_variables))]
    pub async fn ping(&self, timeout: Duration) -> Option<Result<Duration, StoreError>> {
        match self {
            Self::InProcess => None,
            #[cfg(feature = "redis")]
            Self::Redis(store) => Some(store.ping(timeout).await),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<TieredRateLimiter>,
    pub lockout: Arc<LockoutGuard>,
    pub outcomes: Arc<OutcomeTracker>,
    pub scorer: Arc<QualityScorer>,
    pub signals: Arc<RuntimeSignals>,
    pub metrics: Arc<RequestMetrics>,
    pub accounts: Arc<dyn CredentialVerifier>,
    /// Fallback state of both admission components; swept by the scheduler.
    pub local_store: Arc<InMemoryStore>,
    pub coordination: Coordination,
    /// Bound on readiness checks of the shared store.
    pub coordination_timeout: Duration,
    pub ops_api_key: Option<Arc<str>>,
}

impl AppState {
    /// Build the application state, connecting to Redis when configured.
    ///
    /// An unreachable Redis is not fatal; invalid seed accounts are.
    pub async fn new(config: &AppConfig) -> Result<Self, DomainError> {
        #[cfg(feature = "redis")]
        let coordination = Coordination::connect(config.redis.as_ref()).await;
        #[cfg(not(feature = "redis"))]
        let coordination = Coordination::connect().await;

        let directory = InMemoryDirectory::from_seed(config.seed_accounts.as_deref().unwrap_or("")).await?;
        if directory.is_empty().await {
            tracing::warn!("No accounts seeded. Every login will be rejected.");
        }

        let state = Self::assemble(config, coordination, Arc::new(directory))?;
        tracing::info!(
            coordination = state.coordination.backend(),
            sla_target = state.outcomes.sla_target(),
            "Application state initialized"
        );
        Ok(state)
    }

    /// Wire components around an already chosen store and account source.
    pub fn assemble(
        config: &AppConfig,
        coordination: Coordination,
        accounts: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, DomainError> {
        let local_store = Arc::new(InMemoryStore::new());
        let shared = coordination.shared();
        let metrics = RequestMetrics::new().map_err(|e| DomainError::Internal(e.to_string()))?;

        Ok(Self {
            limiter: Arc::new(TieredRateLimiter::new(
                config.rate_limit.clone(),
                shared.clone(),
                local_store.clone(),
            )),
            lockout: Arc::new(LockoutGuard::new(
                config.lockout.clone(),
                shared,
                local_store.clone(),
            )),
            outcomes: Arc::new(OutcomeTracker::new(config.sla_target)),
            scorer: Arc::new(QualityScorer::default()),
            signals: Arc::new(RuntimeSignals::new()),
            metrics: Arc::new(metrics),
            accounts,
            local_store,
            coordination,
            coordination_timeout: config.rate_limit.store_timeout,
            ops_api_key: config.ops_api_key.as_deref().map(Arc::from),
        })
    }
}
