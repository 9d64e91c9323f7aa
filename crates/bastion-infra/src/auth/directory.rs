//! In-memory account directory with Argon2 password hashes.
//!
//! Accounts live for the process lifetime and are seeded from configuration.
//! Hashing runs on the blocking pool so logins do not stall the executor.

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use bastion_core::DomainError;
use bastion_core::domain::{Account, normalize_identifier};
use bastion_core::ports::{AuthError, CredentialVerifier};

const MIN_PASSWORD_LEN: usize = 8;

pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    /// Verified against when the identifier is unknown, so both paths cost
    /// one Argon2 verification.
    decoy_hash: String,
}

impl InMemoryDirectory {
    pub async fn new() -> Result<Self, AuthError> {
        let decoy_hash = blocking(|| hash_password("decoy-password-never-matches")).await?;

        Ok(Self {
            accounts: RwLock::new(HashMap::new()),
            decoy_hash,
        })
    }

    /// Build a directory from `email:password` pairs separated by commas.
    pub async fn from_seed(seed: &str) -> Result<Self, DomainError> {
        let directory = Self::new()
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        for pair in seed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (email, password) = pair.split_once(':').ok_or_else(|| {
                DomainError::Validation(format!("seed entry '{pair}' is not email:password"))
            })?;
            directory.register(email, password).await?;
        }

        Ok(directory)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Account, DomainError> {
        let email = normalize_identifier(email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::Validation("Invalid email address".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.accounts.read().await.contains_key(&email) {
            return Err(DomainError::Duplicate(email));
        }

        let password = password.to_string();
        let hash = blocking(move || hash_password(&password))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        let account = Account::new(&email, hash);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(DomainError::Duplicate(email));
        }
        accounts.insert(email, account.clone());

        tracing::debug!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryDirectory {
    async fn verify(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<Account>, AuthError> {
        let account = self
            .accounts
            .read()
            .await
            .get(&normalize_identifier(identifier))
            .cloned();

        let hash = account
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());
        let password = password.to_string();
        let valid = blocking(move || verify_password(&password, &hash)).await?;

        Ok(account.filter(|_| valid))
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::HashingError(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::HashingError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Unavailable(e.to_string()))?
}
