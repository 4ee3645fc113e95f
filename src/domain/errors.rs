use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::DatabaseError;

/// Errors raised by journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Trade not found: {0}")]
    TradeNotFound(i64),

    /// The acting user does not own the trade
    #[error("User {user_id} is not allowed to access trade {trade_id}")]
    NotTradeOwner { user_id: i64, trade_id: i64 },

    #[error("Set up your account balance before adding trades")]
    AccountNotConfigured { user_id: i64 },

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(DatabaseError),
}

impl JournalError {
    pub fn kind(&self) -> JournalErrorKind {
        match self {
            JournalError::UserNotFound(_) | JournalError::TradeNotFound(_) => {
                JournalErrorKind::NotFound
            }
            JournalError::NotTradeOwner { .. } => JournalErrorKind::Forbidden,
            JournalError::AccountNotConfigured { .. } | JournalError::Conflict(_) => {
                JournalErrorKind::Conflict
            }
            JournalError::Validation(_) => JournalErrorKind::InvalidInput,
            JournalError::Storage(_) => JournalErrorKind::Internal,
        }
    }
}

impl From<DatabaseError> for JournalError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::UniqueViolation(what) => JournalError::Conflict(what),
            other => JournalError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for JournalError {
    fn from(e: sqlx::Error) -> Self {
        JournalError::Storage(DatabaseError::ConnectionError(e))
    }
}

/// Coarse classification used by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidInput,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Close time is before open time")]
    CloseBeforeOpen,

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be finite")]
    MustBeFinite,
}
