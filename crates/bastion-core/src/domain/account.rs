use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lockout::normalize_identifier;

/// Account entity - a principal that can authenticate against the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a generated ID. The email is stored normalized.
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_identifier(email),
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_never_serialized() {
        let account = Account::new("Ops@Example.com", "$argon2id$secret".to_string());
        assert_eq!(account.email, "ops@example.com");

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
