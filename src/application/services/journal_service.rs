//! Journal Service
//!
//! Application layer over the trade ledger and account records. Every
//! operation that writes runs in one transaction: the ledger write, the
//! equity reconciliation and the account update commit together or not at
//! all.
//!
//! Writers are serialized through one lock per service. A deferred SQLite
//! transaction that reads and then writes fails with SQLITE_BUSY when another
//! writer committed in between, and the busy timeout does not retry that.

use crate::domain::entities::{
    AccountRecord, AccountSettings, NewUser, Trade, TradeEntry, TradeFilter, User,
};
use crate::domain::errors::JournalError;
use crate::domain::repositories::rollover_store::RolloverStore;
use crate::domain::services::equity_engine::{self, Reconciliation, TradeMutation};
use crate::domain::services::statistics::{DashboardSummary, StatisticsConfig};
use crate::persistence::models::TradeWrite;
use crate::persistence::repository::{AccountRepository, TradeRepository, UserRepository};
use crate::persistence::DbPool;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

/// Number of trades shown on the dashboard
pub const RECENT_TRADES: u32 = 10;

/// Dashboard payload
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// None until the user configured an account
    pub account: Option<AccountRecord>,
    pub summary: DashboardSummary,
    pub recent_trades: Vec<Trade>,
}

#[derive(Clone)]
pub struct JournalService {
    pool: DbPool,
    statistics: StatisticsConfig,
    writer: Arc<Mutex<()>>,
}

/// An open write transaction and the lock that admits it
struct WriteTx<'a> {
    tx: Transaction<'static, Sqlite>,
    _writer: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    /// Commit, then release the writer lock
    async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

impl Deref for WriteTx<'_> {
    type Target = Transaction<'static, Sqlite>;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for WriteTx<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

impl JournalService {
    pub fn new(pool: DbPool, statistics: StatisticsConfig) -> Self {
        Self {
            pool,
            statistics,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn begin_write(&self) -> Result<WriteTx<'_>, JournalError> {
        let writer = self.writer.lock().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx {
            tx,
            _writer: writer,
        })
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn register_user(&self, user: NewUser) -> Result<User, JournalError> {
        user.validate()?;
        let _writer = self.writer.lock().await;
        let mut conn = self.pool.acquire().await?;
        let created = UserRepository::create(&mut conn, &user).await?;
        info!(user_id = created.id, "Registered user");
        Ok(created)
    }

    /// Create the account on first use, otherwise apply the new settings
    #[instrument(skip(self, settings))]
    pub async fn configure_account(
        &self,
        user_id: i64,
        settings: AccountSettings,
        today: NaiveDate,
    ) -> Result<AccountRecord, JournalError> {
        settings.validate()?;

        let mut tx = self.begin_write().await?;
        require_user(&mut tx, user_id).await?;

        let mut account = match AccountRepository::get(&mut tx, user_id).await? {
            Some(mut existing) => {
                existing.apply_settings(settings);
                existing
            }
            None => {
                info!(user_id, "Creating account record");
                AccountRecord::open(user_id, settings, today)
            }
        };
        reconcile(&mut tx, &mut account).await?;
        AccountRepository::upsert(&mut tx, &account).await?;
        tx.commit().await?;

        info!(user_id, starting_balance = %account.starting_balance, "Account configured");
        Ok(account)
    }

    #[instrument(skip(self, entry), fields(ticket = %entry.ticket))]
    pub async fn add_trade(&self, user_id: i64, entry: TradeEntry) -> Result<Trade, JournalError> {
        let write = TradeWrite::new(entry)?;

        let mut tx = self.begin_write().await?;
        require_user(&mut tx, user_id).await?;
        let mut account = AccountRepository::get(&mut tx, user_id)
            .await?
            .ok_or(JournalError::AccountNotConfigured { user_id })?;

        let trade = TradeRepository::insert(&mut tx, user_id, &write).await?;
        equity_engine::apply_mutation(
            &mut account,
            &TradeMutation::Created {
                profit: trade.profit(),
            },
        );
        reconcile(&mut tx, &mut account).await?;
        AccountRepository::upsert(&mut tx, &account).await?;
        tx.commit().await?;

        info!(user_id, trade_id = trade.id, equity = %account.equity, "Trade added");
        Ok(trade)
    }

    /// Replace a trade's fields; the ticket is kept and screenshot slots
    /// left empty keep their previous file
    #[instrument(skip(self, entry))]
    pub async fn edit_trade(
        &self,
        user_id: i64,
        trade_id: i64,
        mut entry: TradeEntry,
    ) -> Result<Trade, JournalError> {
        let mut tx = self.begin_write().await?;
        let existing = owned_trade(&mut tx, user_id, trade_id).await?;

        entry.ticket = existing.entry.ticket.clone();
        entry.merge_screenshots(&existing.entry.screenshots);
        let write = TradeWrite::new(entry)?;

        let trade = TradeRepository::update(&mut tx, trade_id, &write).await?;
        if let Some(mut account) = AccountRepository::get(&mut tx, user_id).await? {
            equity_engine::apply_mutation(
                &mut account,
                &TradeMutation::Edited {
                    old_profit: existing.profit(),
                    new_profit: trade.profit(),
                },
            );
            reconcile(&mut tx, &mut account).await?;
            AccountRepository::upsert(&mut tx, &account).await?;
        }
        tx.commit().await?;

        info!(user_id, trade_id, "Trade edited");
        Ok(trade)
    }

    #[instrument(skip(self))]
    pub async fn delete_trade(&self, user_id: i64, trade_id: i64) -> Result<(), JournalError> {
        let mut tx = self.begin_write().await?;
        let existing = owned_trade(&mut tx, user_id, trade_id).await?;

        if !TradeRepository::delete(&mut tx, trade_id).await? {
            return Err(JournalError::TradeNotFound(trade_id));
        }
        if let Some(mut account) = AccountRepository::get(&mut tx, user_id).await? {
            equity_engine::apply_mutation(
                &mut account,
                &TradeMutation::Deleted {
                    profit: existing.profit(),
                },
            );
            reconcile(&mut tx, &mut account).await?;
            AccountRepository::upsert(&mut tx, &account).await?;
        }
        tx.commit().await?;

        info!(user_id, trade_id, "Trade deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_trade(&self, user_id: i64, trade_id: i64) -> Result<Trade, JournalError> {
        let mut conn = self.pool.acquire().await?;
        owned_trade(&mut conn, user_id, trade_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_trades(
        &self,
        user_id: i64,
        filter: TradeFilter,
    ) -> Result<Vec<Trade>, JournalError> {
        let mut conn = self.pool.acquire().await?;
        require_user(&mut conn, user_id).await?;
        Ok(TradeRepository::list(&mut conn, user_id, &filter).await?)
    }

    /// Reconcile equity when a user starts a session
    ///
    /// Returns None when the user has not configured an account yet.
    #[instrument(skip(self))]
    pub async fn start_session(&self, user_id: i64) -> Result<Option<AccountRecord>, JournalError> {
        let mut tx = self.begin_write().await?;
        require_user(&mut tx, user_id).await?;

        let account = match AccountRepository::get(&mut tx, user_id).await? {
            Some(mut account) => {
                reconcile(&mut tx, &mut account).await?;
                AccountRepository::upsert(&mut tx, &account).await?;
                Some(account)
            }
            None => None,
        };
        tx.commit().await?;

        info!(user_id, configured = account.is_some(), "Session started");
        Ok(account)
    }

    /// Reconcile, roll the balance for `today`, and compute statistics over
    /// the full ledger
    #[instrument(skip(self))]
    pub async fn dashboard(&self, user_id: i64, today: NaiveDate) -> Result<Dashboard, JournalError> {
        let mut tx = self.begin_write().await?;
        require_user(&mut tx, user_id).await?;

        let trades = TradeRepository::all_for_user(&mut tx, user_id).await?;
        let account = match AccountRepository::get(&mut tx, user_id).await? {
            Some(mut account) => {
                equity_engine::recompute(&mut account, &trades);
                equity_engine::sync_day_rollover(&mut account, today);
                AccountRepository::upsert(&mut tx, &account).await?;
                Some(account)
            }
            None => None,
        };
        let recent_trades =
            TradeRepository::list(&mut tx, user_id, &TradeFilter::recent(RECENT_TRADES)).await?;
        tx.commit().await?;

        Ok(Dashboard {
            account,
            summary: DashboardSummary::compute(&trades, &self.statistics),
            recent_trades,
        })
    }

    /// Delete every trade and clear the account back to zero
    #[instrument(skip(self))]
    pub async fn reset_account(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<AccountRecord, JournalError> {
        let mut tx = self.begin_write().await?;
        require_user(&mut tx, user_id).await?;
        let mut account = AccountRepository::get(&mut tx, user_id)
            .await?
            .ok_or(JournalError::AccountNotConfigured { user_id })?;

        let deleted = TradeRepository::delete_all_for_user(&mut tx, user_id).await?;
        account.reset(today);
        AccountRepository::upsert(&mut tx, &account).await?;
        tx.commit().await?;

        info!(user_id, deleted_trades = deleted, "Account reset");
        Ok(account)
    }
}

#[async_trait]
impl RolloverStore for JournalService {
    async fn account_ids(&self) -> Result<Vec<i64>, JournalError> {
        let mut conn = self.pool.acquire().await?;
        Ok(AccountRepository::list_user_ids(&mut conn).await?)
    }

    async fn roll_account(&self, user_id: i64, today: NaiveDate) -> Result<bool, JournalError> {
        let mut tx = self.begin_write().await?;
        let Some(mut account) = AccountRepository::get(&mut tx, user_id).await? else {
            return Ok(false);
        };

        reconcile(&mut tx, &mut account).await?;
        let rolled = equity_engine::sync_day_rollover(&mut account, today);
        AccountRepository::upsert(&mut tx, &account).await?;
        tx.commit().await?;
        Ok(rolled)
    }
}

async fn require_user(conn: &mut SqliteConnection, user_id: i64) -> Result<User, JournalError> {
    UserRepository::get(conn, user_id)
        .await?
        .ok_or(JournalError::UserNotFound(user_id))
}

async fn owned_trade(
    conn: &mut SqliteConnection,
    user_id: i64,
    trade_id: i64,
) -> Result<Trade, JournalError> {
    let trade = TradeRepository::get(conn, trade_id)
        .await?
        .ok_or(JournalError::TradeNotFound(trade_id))?;
    if !trade.is_owned_by(user_id) {
        return Err(JournalError::NotTradeOwner { user_id, trade_id });
    }
    Ok(trade)
}

/// Recompute equity from the stored ledger
async fn reconcile(
    conn: &mut SqliteConnection,
    account: &mut AccountRecord,
) -> Result<Reconciliation, JournalError> {
    let realized = TradeRepository::total_profit(conn, account.user_id).await?;
    Ok(equity_engine::reconcile_realized(account, realized))
}
