//! Authentication handlers.

use actix_web::{HttpResponse, web};

use bastion_core::domain::normalize_identifier;
use bastion_shared::dto::{LoginRequest, LoginResponse};

use crate::middleware::error::{AppError, AppResult};
use crate::observability::CorrelationId;
use crate::observability::audit::{self, AuditEvent};
use crate::state::AppState;

/// POST /api/auth/login
///
/// Lockout check, then credential verification. Success clears the failure
/// history; a failure is counted and may lock the identifier.
pub async fn login(
    state: web::Data<AppState>,
    correlation_id: CorrelationId,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let identifier = normalize_identifier(&req.email);
    if identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "email and password are required".to_string(),
        ));
    }
    let cid = correlation_id.as_str();

    if !state.lockout.check(&identifier).await {
        audit::record(
            &state.signals,
            cid,
            AuditEvent::LockedAttemptRejected {
                identifier: &identifier,
            },
        );
        return Err(AppError::AccountLocked);
    }

    let Some(account) = state.accounts.verify(&identifier, &req.password).await? else {
        let outcome = state.lockout.record_failure(&identifier).await;
        if outcome.locked {
            audit::record(
                &state.signals,
                cid,
                AuditEvent::AccountLocked {
                    identifier: &identifier,
                    lockout_secs: state.lockout.policy().lockout_duration.as_secs(),
                },
            );
        } else {
            audit::record(
                &state.signals,
                cid,
                AuditEvent::LoginFailed {
                    identifier: &identifier,
                    failures: outcome.failures,
                },
            );
        }
        return Err(AppError::Unauthorized);
    };

    state.lockout.clear(&identifier).await;
    audit::record(
        &state.signals,
        cid,
        AuditEvent::LoginSucceeded {
            account_id: account.id,
        },
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        account_id: account.id,
        email: account.email,
        authenticated_at: chrono::Utc::now().to_rfc3339(),
    }))
}
