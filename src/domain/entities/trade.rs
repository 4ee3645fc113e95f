use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{Money, Price};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum number of screenshot references kept per trade
pub const MAX_SCREENSHOTS: usize = 3;

const MAX_TICKET_LEN: usize = 20;
const MAX_ITEM_LEN: usize = 20;
const MAX_SIZE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    #[serde(alias = "buy", alias = "BUY")]
    Buy,
    #[serde(alias = "sell", alias = "SELL")]
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "Buy"),
            TradeSide::Sell => write!(f, "Sell"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(ValidationError::InvalidField {
                field: "trade_type",
                reason: format!("expected Buy or Sell, got '{}'", other),
            }),
        }
    }
}

/// Trade fields as entered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub ticket: String,
    pub open_time: NaiveDateTime,
    #[serde(default)]
    pub close_time: Option<NaiveDateTime>,
    pub trade_type: TradeSide,
    /// Position size in lots
    pub size: f64,
    pub item: String,
    pub price: Price,
    #[serde(default)]
    pub stop_loss: Option<Price>,
    #[serde(default)]
    pub take_profit: Option<Price>,
    #[serde(default)]
    pub close_price: Option<Price>,
    #[serde(default)]
    pub commission: Money,
    #[serde(default)]
    pub taxes: Money,
    #[serde(default)]
    pub swap: Money,
    #[serde(default)]
    pub profit: Money,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    /// Stored file names of uploaded screenshots
    #[serde(default)]
    pub screenshots: Vec<String>,
}

impl TradeEntry {
    /// Check field constraints before anything is persisted
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("ticket", &self.ticket, MAX_TICKET_LEN)?;
        check_text("item", &self.item, MAX_ITEM_LEN)?;

        if !self.size.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if self.size <= 0.0 || self.size > MAX_SIZE {
            return Err(ValidationError::InvalidSize(format!(
                "{} lots is outside (0, {}]",
                self.size, MAX_SIZE
            )));
        }

        let prices = [
            Some(self.price),
            self.stop_loss,
            self.take_profit,
            self.close_price,
        ];
        if let Some(price) = prices.iter().flatten().find(|p| **p > Price::MAX) {
            return Err(ValidationError::InvalidPrice(format!(
                "{} exceeds {}",
                price,
                Price::MAX
            )));
        }

        if [self.commission, self.taxes, self.swap]
            .iter()
            .any(|fee| fee.is_loss())
        {
            return Err(ValidationError::MustBeNonNegative);
        }

        if self.screenshots.len() > MAX_SCREENSHOTS {
            return Err(ValidationError::InvalidField {
                field: "screenshots",
                reason: format!("at most {} screenshots per trade", MAX_SCREENSHOTS),
            });
        }
        for name in &self.screenshots {
            if name.trim().is_empty()
                || name.contains('/')
                || name.contains('\\')
                || name.contains("..")
            {
                return Err(ValidationError::InvalidField {
                    field: "screenshots",
                    reason: format!("'{}' is not a plain file name", name),
                });
            }
        }

        self.duration_seconds().map(|_| ())
    }

    /// Favourable price movement in hundredths, by trade direction
    pub fn pips(&self) -> Option<i64> {
        let close = self.close_price?;
        Some(match self.trade_type {
            TradeSide::Buy => close.distance_from(self.price),
            TradeSide::Sell => self.price.distance_from(close),
        })
    }

    /// Holding time in seconds
    pub fn duration_seconds(&self) -> Result<Option<i64>, ValidationError> {
        match self.close_time {
            None => Ok(None),
            Some(close) => {
                let seconds = (close - self.open_time).num_seconds();
                if seconds < 0 {
                    Err(ValidationError::CloseBeforeOpen)
                } else {
                    Ok(Some(seconds))
                }
            }
        }
    }

    /// Keep earlier screenshots in every slot the new entry leaves empty
    pub fn merge_screenshots(&mut self, previous: &[String]) {
        if self.screenshots.len() < previous.len() {
            self.screenshots
                .extend_from_slice(&previous[self.screenshots.len()..]);
        }
    }
}

fn check_text(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if len > max_len {
        return Err(ValidationError::InvalidField {
            field,
            reason: format!("must be at most {} characters", max_len),
        });
    }
    Ok(())
}

/// A journaled trade with its stored derived fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub entry: TradeEntry,
    pub pips: Option<i64>,
    pub duration_seconds: Option<i64>,
}

impl Trade {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn profit(&self) -> Money {
        self.entry.profit
    }

    pub fn open_time(&self) -> NaiveDateTime {
        self.entry.open_time
    }
}

/// Ledger query; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TradeFilter {
    /// Open time on or after this day
    pub start_date: Option<NaiveDate>,
    /// Open time on or before this day, inclusive
    pub end_date: Option<NaiveDate>,
    /// Substring of the ticket
    pub ticket: Option<String>,
    pub trade_type: Option<TradeSide>,
    pub limit: Option<u32>,
}

impl TradeFilter {
    pub fn recent(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    pub fn entry(ticket: &str, profit: i64) -> TradeEntry {
        TradeEntry {
            ticket: ticket.to_string(),
            open_time: at(20, 9),
            close_time: Some(at(20, 11)),
            trade_type: TradeSide::Buy,
            size: 1.0,
            item: "EURUSD".to_string(),
            price: Price::parse("100.00").unwrap(),
            stop_loss: Some(Price::parse("99.00").unwrap()),
            take_profit: Some(Price::parse("102.00").unwrap()),
            close_price: Some(Price::parse("101.00").unwrap()),
            commission: Money::ZERO,
            taxes: Money::ZERO,
            swap: Money::ZERO,
            profit: Money::from_units(profit),
            comments: None,
            strategy: None,
            screenshots: vec![],
        }
    }

    pub fn trade(id: i64, profit: i64) -> Trade {
        let entry = entry(&format!("T{}", id), profit);
        Trade {
            id,
            user_id: 1,
            pips: entry.pips(),
            duration_seconds: entry.duration_seconds().unwrap(),
            entry,
        }
    }
}
