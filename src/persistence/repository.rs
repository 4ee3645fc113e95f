//! Database Repository
//!
//! Data access for users, accounts and trades. Every function takes a
//! connection rather than the pool so callers can run several of them inside
//! one transaction (`&mut *tx`).

use super::models::*;
use super::DatabaseError;
use crate::domain::entities::{AccountRecord, NewUser, Trade, TradeFilter, User};
use crate::domain::value_objects::Money;
use chrono::{NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, error};

fn query_error(action: &str, e: sqlx::Error) -> DatabaseError {
    error!("Failed to {}: {}", action, e);
    DatabaseError::QueryError(format!("Failed to {}: {}", action, e))
}

/// User repository
pub struct UserRepository;

impl UserRepository {
    /// Insert a user; a taken username or email is reported as
    /// `DatabaseError::UniqueViolation`
    pub async fn create(conn: &mut SqliteConnection, user: &NewUser) -> Result<User, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(user.username.trim())
        .bind(user.email.trim())
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            let unique = e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false);
            if unique {
                debug!("Username or email already registered: {}", user.username);
                DatabaseError::UniqueViolation("username or email already registered".to_string())
            } else {
                query_error("create user", e)
            }
        })?;

        debug!("Created user: {} ({})", row.id, row.username);
        Ok(row.into())
    }

    /// Get user by ID
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| query_error("get user", e))?;

        Ok(row.map(User::from))
    }
}

/// Account repository
pub struct AccountRepository;

impl AccountRepository {
    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Option<AccountRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| query_error("get account", e))?;

        row.map(AccountRecord::try_from).transpose()
    }

    /// Insert or overwrite the account of `account.user_id`
    pub async fn upsert(
        conn: &mut SqliteConnection,
        account: &AccountRecord,
    ) -> Result<(), DatabaseError> {
        let rules_json = serde_json::to_string(&account.rules)
            .map_err(|e| DatabaseError::QueryError(format!("Failed to encode rules: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO accounts (
                user_id, broker_name, platform, rules_json,
                starting_balance_cents, balance_cents, equity_cents,
                last_update_date, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(user_id) DO UPDATE SET
                broker_name = excluded.broker_name,
                platform = excluded.platform,
                rules_json = excluded.rules_json,
                starting_balance_cents = excluded.starting_balance_cents,
                balance_cents = excluded.balance_cents,
                equity_cents = excluded.equity_cents,
                last_update_date = excluded.last_update_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account.user_id)
        .bind(&account.broker_name)
        .bind(&account.platform)
        .bind(rules_json)
        .bind(account.starting_balance.cents())
        .bind(account.balance.cents())
        .bind(account.equity.cents())
        .bind(account.last_update_date)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(|e| query_error("save account", e))?;

        debug!(
            "Saved account {}: balance {} equity {}",
            account.user_id, account.balance, account.equity
        );
        Ok(())
    }

    /// Users that have an account record
    pub async fn list_user_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>, DatabaseError> {
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM accounts ORDER BY user_id")
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("list accounts", e))
    }
}

/// Trade repository
pub struct TradeRepository;

impl TradeRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        user_id: i64,
        trade: &TradeWrite,
    ) -> Result<Trade, DatabaseError> {
        let now = Utc::now();
        let entry = &trade.entry;
        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            INSERT INTO trades (
                user_id, ticket, open_time, close_time, trade_type, size, item,
                price_hundredths, stop_loss_hundredths, take_profit_hundredths,
                close_price_hundredths, commission_cents, taxes_cents, swap_cents,
                profit_cents, comments, strategy, screenshot_1, screenshot_2,
                screenshot_3, pips, duration_seconds, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?23)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&entry.ticket)
        .bind(entry.open_time)
        .bind(entry.close_time)
        .bind(entry.trade_type.to_string())
        .bind(entry.size)
        .bind(&entry.item)
        .bind(entry.price.hundredths())
        .bind(entry.stop_loss.map(|p| p.hundredths()))
        .bind(entry.take_profit.map(|p| p.hundredths()))
        .bind(entry.close_price.map(|p| p.hundredths()))
        .bind(entry.commission.cents())
        .bind(entry.taxes.cents())
        .bind(entry.swap.cents())
        .bind(entry.profit.cents())
        .bind(&entry.comments)
        .bind(&entry.strategy)
        .bind(trade.screenshot(0))
        .bind(trade.screenshot(1))
        .bind(trade.screenshot(2))
        .bind(trade.pips)
        .bind(trade.duration_seconds)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| query_error("create trade", e))?;

        debug!("Created trade: {} ticket {} for user {}", row.id, row.ticket, user_id);
        row.try_into()
    }

    /// Overwrite every user-editable column; the ticket stays immutable
    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        trade: &TradeWrite,
    ) -> Result<Trade, DatabaseError> {
        let entry = &trade.entry;
        let row = sqlx::query_as::<_, TradeRow>(
            r#"
            UPDATE trades SET
                open_time = ?1, close_time = ?2, trade_type = ?3, size = ?4, item = ?5,
                price_hundredths = ?6, stop_loss_hundredths = ?7,
                take_profit_hundredths = ?8, close_price_hundredths = ?9,
                commission_cents = ?10, taxes_cents = ?11, swap_cents = ?12,
                profit_cents = ?13, comments = ?14, strategy = ?15,
                screenshot_1 = ?16, screenshot_2 = ?17, screenshot_3 = ?18,
                pips = ?19, duration_seconds = ?20, updated_at = ?21
            WHERE id = ?22
            RETURNING *
            "#,
        )
        .bind(entry.open_time)
        .bind(entry.close_time)
        .bind(entry.trade_type.to_string())
        .bind(entry.size)
        .bind(&entry.item)
        .bind(entry.price.hundredths())
        .bind(entry.stop_loss.map(|p| p.hundredths()))
        .bind(entry.take_profit.map(|p| p.hundredths()))
        .bind(entry.close_price.map(|p| p.hundredths()))
        .bind(entry.commission.cents())
        .bind(entry.taxes.cents())
        .bind(entry.swap.cents())
        .bind(entry.profit.cents())
        .bind(&entry.comments)
        .bind(&entry.strategy)
        .bind(trade.screenshot(0))
        .bind(trade.screenshot(1))
        .bind(trade.screenshot(2))
        .bind(trade.pips)
        .bind(trade.duration_seconds)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| query_error("update trade", e))?
        .ok_or_else(|| DatabaseError::QueryError(format!("Trade not found: {}", id)))?;

        debug!("Updated trade: {}", id);
        row.try_into()
    }

    /// Returns false when no such trade existed
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM trades WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("delete trade", e))?
            .rows_affected();

        debug!("Deleted trade: {} ({} rows)", id, rows_affected);
        Ok(rows_affected > 0)
    }

    pub async fn delete_all_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<u64, DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM trades WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("delete trades", e))?
            .rows_affected();

        debug!("Deleted {} trades of user {}", rows_affected, user_id);
        Ok(rows_affected)
    }

    /// Get trade by ID, whoever owns it
    pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Trade>, DatabaseError> {
        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| query_error("get trade", e))?;

        row.map(Trade::try_from).transpose()
    }

    /// Trades of one user matching `filter`, newest open time first
    pub async fn list(
        conn: &mut SqliteConnection,
        user_id: i64,
        filter: &TradeFilter,
    ) -> Result<Vec<Trade>, DatabaseError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM trades WHERE user_id = ");
        query.push_bind(user_id);

        if let Some(start) = filter.start_date {
            query
                .push(" AND open_time >= ")
                .push_bind(start.and_time(NaiveTime::MIN));
        }
        // The end day is inclusive, so compare against the following midnight
        if let Some(after_end) = filter.end_date.and_then(|end| end.succ_opt()) {
            query
                .push(" AND open_time < ")
                .push_bind(after_end.and_time(NaiveTime::MIN));
        }
        if let Some(ticket) = filter.ticket.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query
                .push(" AND ticket LIKE ")
                .push_bind(format!("%{}%", escape_like(ticket)))
                .push(" ESCAPE '\\'");
        }
        if let Some(side) = filter.trade_type {
            query.push(" AND trade_type = ").push_bind(side.to_string());
        }

        query.push(" ORDER BY open_time DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = query
            .build_query_as::<TradeRow>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("list trades", e))?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    /// All trades of a user, oldest first
    pub async fn all_for_user(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<Trade>, DatabaseError> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE user_id = ?1 ORDER BY open_time ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| query_error("load trades", e))?;

        rows.into_iter().map(Trade::try_from).collect()
    }

    /// Σ profit over the ledger of a user
    pub async fn total_profit(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Money, DatabaseError> {
        let cents = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(profit_cents), 0) FROM trades WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| query_error("sum profits", e))?;

        Ok(Money::from_cents(cents))
    }
}

/// Escape LIKE wildcards so the text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
