//! Request tiers and their admission quotas.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// A named request class with its own rate quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Authentication endpoints (brute-force protection).
    Auth,
    /// Mutating requests.
    Write,
    /// Everything else.
    Global,
}

impl Tier {
    /// Classify a request by method and path.
    ///
    /// Any path with an `/auth` segment is `Auth` regardless of method.
    pub fn classify(method: &str, path: &str) -> Self {
        if path.contains("/auth/") || path.ends_with("/auth") {
            return Tier::Auth;
        }

        match method.to_ascii_uppercase().as_str() {
            "POST" | "PUT" | "PATCH" | "DELETE" => Tier::Write,
            _ => Tier::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Auth => "auth",
            Tier::Write => "write",
            Tier::Global => "global",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier quotas over a shared window length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierQuotas {
    pub auth: u32,
    pub write: u32,
    pub global: u32,
    pub window: Duration,
}

impl Default for TierQuotas {
    fn default() -> Self {
        Self {
            auth: 10,
            write: 30,
            global: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl TierQuotas {
    pub fn limit_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Auth => self.auth,
            Tier::Write => self.write,
            Tier::Global => self.global,
        }
    }
}

/// Outcome of a single admission check against a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Events retained in the window after this check.
    pub count: u32,
}

/// Admission decision surfaced to the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub allowed: bool,
    pub tier: Tier,
    pub limit: u32,
    pub remaining: u32,
}

impl Admission {
    pub fn from_decision(tier: Tier, limit: u32, decision: WindowDecision) -> Self {
        let remaining = if decision.allowed {
            limit.saturating_sub(decision.count)
        } else {
            0
        };

        Self {
            allowed: decision.allowed,
            tier,
            limit,
            remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_paths_take_precedence() {
        assert_eq!(Tier::classify("POST", "/api/auth/login"), Tier::Auth);
        assert_eq!(Tier::classify("GET", "/api/v1/auth"), Tier::Auth);
        assert_eq!(Tier::classify("DELETE", "/auth/session"), Tier::Auth);
    }

    #[test]
    fn test_author_path_is_not_auth() {
        assert_eq!(Tier::classify("GET", "/api/authors"), Tier::Global);
    }

    #[test]
    fn test_mutating_verbs_are_write() {
        for method in ["POST", "put", "Patch", "DELETE"] {
            assert_eq!(Tier::classify(method, "/api/users"), Tier::Write);
        }
        assert_eq!(Tier::classify("GET", "/api/users"), Tier::Global);
        assert_eq!(Tier::classify("HEAD", "/api/users"), Tier::Global);
    }

    #[test]
    fn test_default_quotas() {
        let quotas = TierQuotas::default();
        assert_eq!(quotas.limit_for(Tier::Auth), 10);
        assert_eq!(quotas.limit_for(Tier::Write), 30);
        assert_eq!(quotas.limit_for(Tier::Global), 100);
        assert_eq!(quotas.window, Duration::from_secs(60));
    }

    #[test]
    fn test_denied_admission_has_no_remaining() {
        let admission = Admission::from_decision(
            Tier::Auth,
            10,
            WindowDecision {
                allowed: false,
                count: 10,
            },
        );
        assert!(!admission.allowed);
        assert_eq!(admission.remaining, 0);

        let admission = Admission::from_decision(
            Tier::Write,
            30,
            WindowDecision {
                allowed: true,
                count: 4,
            },
        );
        assert_eq!(admission.remaining, 26);
    }
}
