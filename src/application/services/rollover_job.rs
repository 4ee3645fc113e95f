//! Daily rollover job
//!
//! One pass reconciles every account and rolls its balance forward when the
//! calendar day changed. Accounts are processed independently: a failure is
//! logged and recorded in the report, and the pass moves on.

use crate::domain::errors::JournalError;
use crate::domain::repositories::rollover_store::RolloverStore;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, instrument};

/// Outcome of one rollover pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RolloverReport {
    pub rolled: usize,
    pub unchanged: usize,
    /// `(user_id, error message)` for every account that failed
    pub failed: Vec<(i64, String)>,
}

impl RolloverReport {
    pub fn processed(&self) -> usize {
        self.rolled + self.unchanged + self.failed.len()
    }
}

/// Run one pass over every account
///
/// # Errors
/// Only when the account list itself cannot be read; per-account failures
/// are reported in `RolloverReport::failed`.
#[instrument(skip(store))]
pub async fn roll_all_accounts<S>(store: &S, today: NaiveDate) -> Result<RolloverReport, JournalError>
where
    S: RolloverStore + ?Sized,
{
    let user_ids = store.account_ids().await?;
    let mut report = RolloverReport::default();

    for user_id in user_ids {
        match store.roll_account(user_id, today).await {
            Ok(true) => report.rolled += 1,
            Ok(false) => report.unchanged += 1,
            Err(e) => {
                error!(user_id, "Rollover failed for account: {}", e);
                report.failed.push((user_id, e.to_string()));
            }
        }
    }

    info!(
        rolled = report.rolled,
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "Rollover pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::DatabaseError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Accounts keyed by user id with their last rollover date
    struct MockStore {
        accounts: Mutex<HashMap<i64, NaiveDate>>,
        failing: Vec<i64>,
        list_fails: bool,
    }

    impl MockStore {
        fn new(ids: &[i64], last: NaiveDate) -> Self {
            Self {
                accounts: Mutex::new(ids.iter().map(|id| (*id, last)).collect()),
                failing: vec![],
                list_fails: false,
            }
        }
    }

    #[async_trait]
    impl RolloverStore for MockStore {
        async fn account_ids(&self) -> Result<Vec<i64>, JournalError> {
            if self.list_fails {
                return Err(DatabaseError::QueryError("database is locked".to_string()).into());
            }
            let mut ids: Vec<i64> = self.accounts.lock().unwrap().keys().copied().collect();
            ids.sort();
            Ok(ids)
        }

        async fn roll_account(&self, user_id: i64, today: NaiveDate) -> Result<bool, JournalError> {
            if self.failing.contains(&user_id) {
                return Err(DatabaseError::QueryError(format!("row {} is corrupt", user_id)).into());
            }
            let mut accounts = self.accounts.lock().unwrap();
            let last = accounts.get_mut(&user_id).ok_or(JournalError::UserNotFound(user_id))?;
            if *last == today {
                return Ok(false);
            }
            *last = today;
            Ok(true)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_failing_account_does_not_stop_pass() {
        let mut store = MockStore::new(&[1, 2, 3], day(20));
        store.failing = vec![2];

        let report = roll_all_accounts(&store, day(21)).await.unwrap();
        assert_eq!(report.rolled, 2);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(report.failed[0].1.contains("corrupt"));

        let accounts = store.accounts.lock().unwrap();
        assert_eq!(accounts[&1], day(21));
        assert_eq!(accounts[&2], day(20));
        assert_eq!(accounts[&3], day(21));
    }

    #[tokio::test]
    async fn test_second_pass_same_day_is_noop() {
        let store = MockStore::new(&[1, 2], day(20));
        roll_all_accounts(&store, day(21)).await.unwrap();

        let report = roll_all_accounts(&store, day(21)).await.unwrap();
        assert_eq!(report.rolled, 0);
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.processed(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_account_list_is_an_error() {
        let mut store = MockStore::new(&[1], day(20));
        store.list_fails = true;
        assert!(roll_all_accounts(&store, day(21)).await.is_err());
    }
}
