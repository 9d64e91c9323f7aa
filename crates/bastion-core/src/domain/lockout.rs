//! Failed-authentication lockout policy.

use std::time::Duration;

/// Lockout thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock.
    pub max_attempts: u32,
    /// How long a triggered lock lasts. Also the TTL of the failure counter.
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Result of recording one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Failure counter after this attempt. Zero once a lock was triggered.
    pub failures: u32,
    /// Whether this attempt crossed the threshold.
    pub locked: bool,
}

impl FailureOutcome {
    pub fn counted(failures: u32) -> Self {
        Self {
            failures,
            locked: false,
        }
    }

    pub fn locked() -> Self {
        Self {
            failures: 0,
            locked: true,
        }
    }
}

/// Normalize an account identifier so that case and surrounding whitespace
/// variants share one counter.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}
