//! Database Models
//!
//! Row structs for users, accounts and trades, and their conversion into
//! domain types.

use super::DatabaseError;
use crate::domain::entities::{AccountRecord, Trade, TradeEntry, TradeSide, TradingRules, User};
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{Money, Price};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::FromRow;

/// User record in database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

/// Account record in database
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub user_id: i64,
    pub broker_name: Option<String>,
    pub platform: Option<String>,
    pub rules_json: String, // JSON string
    pub starting_balance_cents: i64,
    pub balance_cents: i64,
    pub equity_cents: i64,
    pub last_update_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for AccountRecord {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let rules: TradingRules = serde_json::from_str(&row.rules_json).map_err(|e| {
            DatabaseError::CorruptRow(format!("account {} rules: {}", row.user_id, e))
        })?;

        Ok(AccountRecord {
            user_id: row.user_id,
            broker_name: row.broker_name,
            platform: row.platform,
            rules,
            starting_balance: Money::from_cents(row.starting_balance_cents),
            balance: Money::from_cents(row.balance_cents),
            equity: Money::from_cents(row.equity_cents),
            last_update_date: row.last_update_date,
        })
    }
}

/// Trade record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub user_id: i64,
    pub ticket: String,
    pub open_time: NaiveDateTime,
    pub close_time: Option<NaiveDateTime>,
    pub trade_type: String, // "Buy" or "Sell"
    pub size: f64,
    pub item: String,
    pub price_hundredths: i64,
    pub stop_loss_hundredths: Option<i64>,
    pub take_profit_hundredths: Option<i64>,
    pub close_price_hundredths: Option<i64>,
    pub commission_cents: i64,
    pub taxes_cents: i64,
    pub swap_cents: i64,
    pub profit_cents: i64,
    pub comments: Option<String>,
    pub strategy: Option<String>,
    pub screenshot_1: Option<String>,
    pub screenshot_2: Option<String>,
    pub screenshot_3: Option<String>,
    pub pips: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = DatabaseError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt =
            |what: &str, e: String| DatabaseError::CorruptRow(format!("trade {} {}: {}", id, what, e));
        let price = |value: i64, what: &str| {
            Price::from_hundredths(value).map_err(|e| corrupt(what, e.to_string()))
        };
        let optional_price = |value: Option<i64>, what: &str| value.map(|v| price(v, what)).transpose();

        let trade_type: TradeSide = row
            .trade_type
            .parse()
            .map_err(|e: ValidationError| corrupt("trade_type", e.to_string()))?;

        let entry = TradeEntry {
            ticket: row.ticket,
            open_time: row.open_time,
            close_time: row.close_time,
            trade_type,
            size: row.size,
            item: row.item,
            price: price(row.price_hundredths, "price")?,
            stop_loss: optional_price(row.stop_loss_hundredths, "stop_loss")?,
            take_profit: optional_price(row.take_profit_hundredths, "take_profit")?,
            close_price: optional_price(row.close_price_hundredths, "close_price")?,
            commission: Money::from_cents(row.commission_cents),
            taxes: Money::from_cents(row.taxes_cents),
            swap: Money::from_cents(row.swap_cents),
            profit: Money::from_cents(row.profit_cents),
            comments: row.comments,
            strategy: row.strategy,
            screenshots: [row.screenshot_1, row.screenshot_2, row.screenshot_3]
                .into_iter()
                .flatten()
                .collect(),
        };

        Ok(Trade {
            id,
            user_id: row.user_id,
            entry,
            pips: row.pips,
            duration_seconds: row.duration_seconds,
        })
    }
}

/// Column values for an insert or update, derived fields included
#[derive(Debug, Clone)]
pub struct TradeWrite {
    pub entry: TradeEntry,
    pub pips: Option<i64>,
    pub duration_seconds: Option<i64>,
}

impl TradeWrite {
    /// Validate the entry and derive the stored fields from it
    pub fn new(entry: TradeEntry) -> Result<Self, ValidationError> {
        entry.validate()?;
        Ok(Self {
            pips: entry.pips(),
            duration_seconds: entry.duration_seconds()?,
            entry,
        })
    }

    pub fn screenshot(&self, slot: usize) -> Option<&str> {
        self.entry.screenshots.get(slot).map(String::as_str)
    }
}
