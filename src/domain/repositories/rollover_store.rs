//! Rollover Store Trait
//!
//! What the daily rollover job needs from storage. Each call to
//! `roll_account` is its own unit of work, so one failing account leaves
//! the others untouched.

use crate::domain::errors::JournalError;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait RolloverStore: Send + Sync {
    /// Users that currently have an account record
    async fn account_ids(&self) -> Result<Vec<i64>, JournalError>;

    /// Reconcile one account and roll its balance forward to `today`
    ///
    /// Returns whether the balance was rolled. An account deleted since
    /// `account_ids` was read counts as not rolled.
    async fn roll_account(&self, user_id: i64, today: NaiveDate) -> Result<bool, JournalError>;
}
