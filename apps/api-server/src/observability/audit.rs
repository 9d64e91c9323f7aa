//! Security audit trail.
//!
//! Events are structured `tracing` records under the `audit` target, so they
//! can be routed to a dedicated sink by filter.

use uuid::Uuid;

use super::RuntimeSignals;

/// A security-relevant event.
#[derive(Debug, Clone)]
pub enum AuditEvent<'a> {
    LoginSucceeded { account_id: Uuid },
    LoginFailed { identifier: &'a str, failures: u32 },
    AccountLocked { identifier: &'a str, lockout_secs: u64 },
    LockedAttemptRejected { identifier: &'a str },
}

impl AuditEvent<'_> {
    pub fn action(&self) -> &'static str {
        match self {
            AuditEvent::LoginSucceeded { .. } => "auth.login",
            AuditEvent::LoginFailed { .. } => "auth.failed",
            AuditEvent::AccountLocked { .. } => "auth.locked",
            AuditEvent::LockedAttemptRejected { .. } => "auth.locked_rejected",
        }
    }
}

/// Emit `event` and account for it in the data-integrity signal.
pub fn record(signals: &RuntimeSignals, correlation_id: &str, event: AuditEvent<'_>) {
    signals.audit_expected();

    let action = event.action();
    match event {
        AuditEvent::LoginSucceeded { account_id } => {
            tracing::info!(target: "audit", action, correlation_id, %account_id, "Login succeeded");
        }
        AuditEvent::LoginFailed {
            identifier,
            failures,
        } => {
            tracing::warn!(target: "audit", action, correlation_id, identifier, failures, "Login failed");
        }
        AuditEvent::AccountLocked {
            identifier,
            lockout_secs,
        } => {
            tracing::warn!(target: "audit", action, correlation_id, identifier, lockout_secs, "Account locked");
        }
        AuditEvent::LockedAttemptRejected { identifier } => {
            tracing::warn!(target: "audit", action, correlation_id, identifier, "Login rejected, account locked");
        }
    }

    signals.audit_recorded();
}
