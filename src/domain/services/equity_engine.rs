//! Equity engine - keeps account equity in line with the trade ledger
//!
//! Full recompute is the source of truth and runs on every trade mutation,
//! session start and rollover pass. The incremental form (`apply_delta`)
//! exists for callers that already hold the previous equity, and must always
//! agree with a recompute over the resulting ledger.

use crate::domain::entities::account::AccountRecord;
use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::Money;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Result of reconciling an account against its ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous_equity: Money,
    pub equity: Money,
}

impl Reconciliation {
    /// Stored equity minus recomputed equity
    pub fn drift(&self) -> Money {
        self.previous_equity - self.equity
    }

    pub fn is_consistent(&self) -> bool {
        self.drift() == Money::ZERO
    }
}

/// A change to the ledger and the equity delta it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeMutation {
    Created { profit: Money },
    Edited { old_profit: Money, new_profit: Money },
    Deleted { profit: Money },
}

impl TradeMutation {
    pub fn delta(&self) -> Money {
        match *self {
            TradeMutation::Created { profit } => profit,
            TradeMutation::Edited {
                old_profit,
                new_profit,
            } => new_profit - old_profit,
            TradeMutation::Deleted { profit } => -profit,
        }
    }
}

/// Set `equity = starting_balance + Σ profit` over the given trades
pub fn recompute(account: &mut AccountRecord, trades: &[Trade]) -> Reconciliation {
    let realized: Money = trades.iter().map(Trade::profit).sum();
    reconcile_realized(account, realized)
}

/// Same as [`recompute`] when the ledger total is already aggregated
pub fn reconcile_realized(account: &mut AccountRecord, realized_pnl: Money) -> Reconciliation {
    let reconciliation = Reconciliation {
        previous_equity: account.equity,
        equity: account.starting_balance + realized_pnl,
    };
    account.equity = reconciliation.equity;

    if reconciliation.is_consistent() {
        debug!(
            user_id = account.user_id,
            equity = %account.equity,
            "Equity consistent with ledger"
        );
    } else {
        warn!(
            user_id = account.user_id,
            stored = %reconciliation.previous_equity,
            recomputed = %reconciliation.equity,
            drift = %reconciliation.drift(),
            "Equity drifted from ledger, corrected by recompute"
        );
    }
    reconciliation
}

/// `equity += delta`
pub fn apply_delta(account: &mut AccountRecord, delta: Money) {
    account.equity += delta;
    debug!(user_id = account.user_id, delta = %delta, equity = %account.equity, "Applied equity delta");
}

pub fn apply_mutation(account: &mut AccountRecord, mutation: &TradeMutation) {
    apply_delta(account, mutation.delta());
}

/// Roll balance forward once per calendar day
///
/// Returns true when the balance was rolled; a second call on the same day
/// changes nothing.
pub fn sync_day_rollover(account: &mut AccountRecord, today: NaiveDate) -> bool {
    if account.last_update_date == today {
        return false;
    }
    let previous_balance = account.balance;
    account.balance = account.equity;
    account.last_update_date = today;
    info!(
        user_id = account.user_id,
        previous_balance = %previous_balance,
        balance = %account.balance,
        date = %today,
        "Rolled balance forward"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::account::{AccountSettings, TradingRules};
    use crate::domain::entities::trade::fixtures::trade;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn account(balance: i64) -> AccountRecord {
        AccountRecord::open(
            1,
            AccountSettings {
                broker_name: None,
                platform: None,
                starting_balance: Money::from_units(balance),
                rules: TradingRules::default(),
            },
            day(20),
        )
    }

    #[test]
    fn test_recompute_example_ledger() {
        let trades: Vec<Trade> = [100, -50, 200, -300]
            .iter()
            .enumerate()
            .map(|(i, p)| trade(i as i64 + 1, *p))
            .collect();
        let mut acc = account(1000);
        let result = recompute(&mut acc, &trades);
        assert_eq!(acc.equity, Money::from_units(950));
        assert_eq!(result.equity, Money::from_units(950));
        assert_eq!(result.drift(), Money::from_units(50));
    }

    #[test]
    fn test_recompute_empty_ledger() {
        let mut acc = account(1000);
        let result = recompute(&mut acc, &[]);
        assert!(result.is_consistent());
        assert_eq!(acc.equity, Money::from_units(1000));
    }

    #[test]
    fn test_recompute_corrects_drift() {
        let mut acc = account(1000);
        acc.equity = Money::from_units(5);
        let result = recompute(&mut acc, &[trade(1, 20)]);
        assert_eq!(acc.equity, Money::from_units(1020));
        assert!(!result.is_consistent());
    }

    #[test]
    fn test_mutation_deltas() {
        let p = Money::from_units(40);
        assert_eq!(TradeMutation::Created { profit: p }.delta(), p);
        assert_eq!(TradeMutation::Deleted { profit: p }.delta(), -p);
        assert_eq!(
            TradeMutation::Edited {
                old_profit: p,
                new_profit: Money::from_units(-10)
            }
            .delta(),
            Money::from_units(-50)
        );
    }

    /// Replays pseudo-random create/edit/delete sequences and checks the
    /// incremental equity against a recompute of the final ledger.
    #[test]
    fn test_deltas_match_recompute() {
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        for _ in 0..50 {
            let mut incremental = account(1000);
            let mut ledger: Vec<Trade> = Vec::new();
            let mut next_id = 1;

            for _ in 0..40 {
                let profit = next(2001) as i64 - 1000;
                let op = if ledger.is_empty() { 0 } else { next(3) };
                let mutation = match op {
                    0 => {
                        ledger.push(trade(next_id, profit));
                        next_id += 1;
                        TradeMutation::Created { profit: Money::from_units(profit) }
                    }
                    1 => {
                        let idx = next(ledger.len() as u64) as usize;
                        let old_profit = ledger[idx].profit();
                        ledger[idx].entry.profit = Money::from_units(profit);
                        TradeMutation::Edited { old_profit, new_profit: Money::from_units(profit) }
                    }
                    _ => {
                        let idx = next(ledger.len() as u64) as usize;
                        let removed = ledger.remove(idx);
                        TradeMutation::Deleted { profit: removed.profit() }
                    }
                };
                apply_mutation(&mut incremental, &mutation);
            }

            let mut recomputed = account(1000);
            recompute(&mut recomputed, &ledger);
            assert_eq!(incremental.equity, recomputed.equity);
            assert!(recompute(&mut incremental, &ledger).is_consistent());
        }
    }

    #[test]
    fn test_rollover_moves_equity_into_balance() {
        let mut acc = account(1000);
        recompute(&mut acc, &[trade(1, 250)]);
        assert!(sync_day_rollover(&mut acc, day(21)));
        assert_eq!(acc.balance, Money::from_units(1250));
        assert_eq!(acc.last_update_date, day(21));
    }

    #[test]
    fn test_rollover_idempotent_within_day() {
        let mut acc = account(1000);
        recompute(&mut acc, &[trade(1, 250)]);
        assert!(sync_day_rollover(&mut acc, day(21)));
        let after_first = acc.clone();

        acc.equity = Money::from_units(9999);
        assert!(!sync_day_rollover(&mut acc, day(21)));
        assert_eq!(acc.balance, after_first.balance);
        assert_eq!(acc.last_update_date, after_first.last_update_date);
    }

    #[test]
    fn test_rollover_then_recompute_does_not_double_count() {
        let trades = vec![trade(1, 100), trade(2, -30)];
        let mut acc = account(1000);
        recompute(&mut acc, &trades);
        sync_day_rollover(&mut acc, day(21));
        recompute(&mut acc, &trades);
        assert_eq!(acc.equity, Money::from_units(1070));
        assert_eq!(acc.balance, Money::from_units(1070));
    }
}
