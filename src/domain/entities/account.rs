//! Account record - per-user configuration and equity state

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Risk rules the trader commits to; stored verbatim, never enforced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingRules {
    pub min_trading_days: Option<u32>,
    pub max_daily_loss: Option<String>,
    pub max_loss: Option<String>,
    pub profit_target: Option<String>,
    pub instrument: Option<String>,
    pub trading_session: Option<String>,
    pub risk_reward: Option<String>,
    pub daily_max_loss: Option<String>,
    pub consecutive_losers: Option<String>,
    pub trading_strategy: Option<String>,
    pub timeframes: Option<String>,
    pub trades_per_day: Option<u32>,
}

/// Account configuration submitted by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Capital the account started with
    pub starting_balance: Money,
    #[serde(default)]
    pub rules: TradingRules,
}

impl AccountSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.starting_balance.is_loss() {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(())
    }
}

/// Account state owned by the equity engine
///
/// `starting_balance` anchors equity reconciliation, `balance` is the
/// equity snapshot taken at the last daily rollover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: i64,
    pub broker_name: Option<String>,
    pub platform: Option<String>,
    pub rules: TradingRules,
    pub starting_balance: Money,
    pub balance: Money,
    pub equity: Money,
    pub last_update_date: NaiveDate,
}

impl AccountRecord {
    /// New account with no trades yet
    pub fn open(user_id: i64, settings: AccountSettings, today: NaiveDate) -> Self {
        let starting = settings.starting_balance;
        Self {
            user_id,
            broker_name: settings.broker_name,
            platform: settings.platform,
            rules: settings.rules,
            starting_balance: starting,
            balance: starting,
            equity: starting,
            last_update_date: today,
        }
    }

    /// Apply new settings; a changed starting balance shifts balance and
    /// equity by the same amount so past rollovers stay consistent.
    pub fn apply_settings(&mut self, settings: AccountSettings) {
        let adjustment = settings.starting_balance - self.starting_balance;
        self.broker_name = settings.broker_name;
        self.platform = settings.platform;
        self.rules = settings.rules;
        self.starting_balance = settings.starting_balance;
        self.balance += adjustment;
        self.equity += adjustment;
    }

    /// Clear configuration and money fields back to an empty account
    pub fn reset(&mut self, today: NaiveDate) {
        self.broker_name = None;
        self.platform = None;
        self.rules = TradingRules::default();
        self.starting_balance = Money::ZERO;
        self.balance = Money::ZERO;
        self.equity = Money::ZERO;
        self.last_update_date = today;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn settings(balance: i64) -> AccountSettings {
        AccountSettings {
            broker_name: Some("FTMO".to_string()),
            platform: Some("MT5".to_string()),
            starting_balance: Money::from_units(balance),
            rules: TradingRules::default(),
        }
    }

    #[test]
    fn test_open_sets_all_balances() {
        let account = AccountRecord::open(1, settings(1000), day(20));
        assert_eq!(account.balance, Money::from_units(1000));
        assert_eq!(account.equity, Money::from_units(1000));
        assert_eq!(account.last_update_date, day(20));
    }

    #[test]
    fn test_apply_settings_shifts_balance() {
        let mut account = AccountRecord::open(1, settings(1000), day(20));
        account.balance = Money::from_units(1200);
        account.apply_settings(settings(1500));
        assert_eq!(account.starting_balance, Money::from_units(1500));
        assert_eq!(account.balance, Money::from_units(1700));
        assert_eq!(account.equity, Money::from_units(1500));
    }

    #[test]
    fn test_negative_starting_balance_rejected() {
        assert_eq!(
            settings(-1).validate(),
            Err(ValidationError::MustBeNonNegative)
        );
    }

    #[test]
    fn test_reset() {
        let mut account = AccountRecord::open(1, settings(1000), day(20));
        account.reset(day(21));
        assert_eq!(account.equity, Money::ZERO);
        assert_eq!(account.broker_name, None);
        assert_eq!(account.last_update_date, day(21));
    }
}
