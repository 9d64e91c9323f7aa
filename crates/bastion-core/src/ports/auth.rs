//! Authentication ports.

use async_trait::async_trait;

use crate::domain::Account;

/// Resolves login credentials to an account.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` for unknown identifiers and wrong passwords alike.
    async fn verify(&self, identifier: &str, password: &str)
    -> Result<Option<Account>, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Hashing error: {0}")]
    HashingError(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}
