//! Trading statistics over a user's ledger
//!
//! Every function is pure and orders trades by open time itself, so callers
//! may pass the ledger in any order. Undefined ratios (no trades, no losses,
//! zero spread) evaluate to 0.

use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::Money;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Risk-reward ratios above this are treated as data-entry noise
pub const DEFAULT_MAX_RISK_REWARD: f64 = 10.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsConfig {
    pub risk_free_rate: f64,
    pub max_risk_reward: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            max_risk_reward: DEFAULT_MAX_RISK_REWARD,
        }
    }
}

fn chronological(trades: &[Trade]) -> Vec<&Trade> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.open_time());
    ordered
}

/// Cumulative profit curve, starting at zero before the first trade
pub fn equity_curve(trades: &[Trade]) -> Vec<Money> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut running = Money::ZERO;
    curve.push(running);
    for trade in chronological(trades) {
        running += trade.profit();
        curve.push(running);
    }
    curve
}

/// Largest peak-to-current decline of the equity curve
pub fn max_drawdown(trades: &[Trade]) -> Money {
    let mut peak = Money::ZERO;
    let mut worst = Money::ZERO;
    for value in equity_curve(trades) {
        if value > peak {
            peak = value;
        }
        let drawdown = peak - value;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}

/// Mean of `|tp - entry| / |sl - entry|` over trades with usable stops
pub fn average_risk_reward_ratio(trades: &[Trade], max_rrr: f64) -> f64 {
    let ratios: Vec<f64> = trades
        .iter()
        .filter_map(|t| {
            let take_profit = t.entry.take_profit?;
            let stop_loss = t.entry.stop_loss?;
            let risk = stop_loss.distance_from(t.entry.price).abs();
            if risk == 0 {
                return None;
            }
            let reward = take_profit.distance_from(t.entry.price).abs();
            Some(reward as f64 / risk as f64)
        })
        .filter(|rrr| *rrr <= max_rrr)
        .collect();

    if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

/// Mean profit per trade in currency units
pub fn expectancy(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let total: Money = trades.iter().map(Trade::profit).sum();
    total.to_f64() / trades.len() as f64
}

/// Gross gains over gross losses; 0 when there are no losses
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gains: Money = trades
        .iter()
        .map(Trade::profit)
        .filter(Money::is_profit)
        .sum();
    let losses: Money = trades
        .iter()
        .map(Trade::profit)
        .filter(Money::is_loss)
        .sum::<Money>()
        .abs();

    if losses == Money::ZERO {
        0.0
    } else {
        gains.to_f64() / losses.to_f64()
    }
}

/// `(mean - risk_free_rate) / population stddev` of per-trade profits
pub fn sharpe_ratio(trades: &[Trade], risk_free_rate: f64) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(|t| t.profit().to_f64()).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        0.0
    } else {
        (mean - risk_free_rate) / std_dev
    }
}

/// Per-day aggregate of trades opened that day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub trades: usize,
    pub lots: f64,
    pub result: Money,
}

/// Group by calendar date of open time, newest day first
pub fn daily_summary(trades: &[Trade]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
    for trade in trades {
        let date = trade.open_time().date();
        let day = days.entry(date).or_insert_with(|| DailySummary {
            date,
            trades: 0,
            lots: 0.0,
            result: Money::ZERO,
        });
        day.trades += 1;
        day.lots += trade.entry.size;
        day.result += trade.profit();
    }
    days.into_values().rev().collect()
}

/// Mean to the nearest cent, halves rounded away from zero
fn mean_money(values: &[Money]) -> Money {
    if values.is_empty() {
        return Money::ZERO;
    }
    let total: i128 = values.iter().map(|m| i128::from(m.cents())).sum();
    let count = values.len() as i128;
    let half = count / 2;
    let rounded = if total >= 0 {
        (total + half) / count
    } else {
        (total - half) / count
    };
    // A mean of i64 values stays within i64
    Money::from_cents(rounded as i64)
}

/// Everything the dashboard shows about a ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Trades with profit <= 0, breakeven included
    pub losing_trades: usize,
    /// Percentage, 0..=100
    pub win_rate: f64,
    pub average_profit: Money,
    pub average_loss: Money,
    pub net_profit: Money,
    pub total_lots: f64,
    pub max_drawdown: Money,
    pub average_rrr: f64,
    pub expectancy: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub daily: Vec<DailySummary>,
}

impl DashboardSummary {
    pub fn compute(trades: &[Trade], config: &StatisticsConfig) -> Self {
        let (winners, losers): (Vec<Money>, Vec<Money>) = trades
            .iter()
            .map(Trade::profit)
            .partition(Money::is_profit);

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winners.len() as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_trades,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            average_profit: mean_money(&winners),
            average_loss: mean_money(&losers),
            net_profit: trades.iter().map(Trade::profit).sum(),
            total_lots: trades.iter().map(|t| t.entry.size).sum(),
            max_drawdown: max_drawdown(trades),
            average_rrr: average_risk_reward_ratio(trades, config.max_risk_reward),
            expectancy: expectancy(trades),
            profit_factor: profit_factor(trades),
            sharpe_ratio: sharpe_ratio(trades, config.risk_free_rate),
            daily: daily_summary(trades),
        }
    }
}
