use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Registration input; the password hash is produced by the caller
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let username_len = self.username.trim().chars().count();
        if !(2..=50).contains(&username_len) {
            return Err(ValidationError::InvalidField {
                field: "username",
                reason: "must be between 2 and 50 characters".to_string(),
            });
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed || email.len() > 100 {
            return Err(ValidationError::InvalidField {
                field: "email",
                reason: format!("'{}' is not a valid email address", email),
            });
        }

        if self.password_hash.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "password_hash",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
