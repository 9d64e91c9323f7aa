//! Application configuration loaded from environment variables.

use std::env;

#[cfg(feature = "redis")]
use bastion_infra::RedisConfig;
use bastion_infra::{LockoutConfig, RateLimitConfig};

#[cfg(feature = "scheduler")]
use crate::background::SchedulerConfig;

const DEFAULT_SLA_TARGET: f64 = 0.999;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs admission control on in-process state only.
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    pub rate_limit: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub sla_target: f64,
    /// Required in `X-Ops-Key` for operator endpoints when set.
    pub ops_api_key: Option<String>,
    /// `email:password` pairs, comma separated
    pub seed_accounts: Option<String>,
    #[cfg(feature = "scheduler")]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            #[cfg(feature = "redis")]
            redis: None,
            rate_limit: RateLimitConfig::default(),
            lockout: LockoutConfig::default(),
            sla_target: DEFAULT_SLA_TARGET,
            ops_api_key: None,
            seed_accounts: None,
            #[cfg(feature = "scheduler")]
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            lockout: LockoutConfig::from_env(),
            sla_target: env::var("SLA_TARGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SLA_TARGET),
            ops_api_key: non_empty("OPS_API_KEY"),
            seed_accounts: non_empty("SEED_ACCOUNTS"),
            #[cfg(feature = "scheduler")]
            scheduler: SchedulerConfig::from_env(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
