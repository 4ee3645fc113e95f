pub mod account;
pub mod trade;
pub mod user;

pub use account::{AccountRecord, AccountSettings, TradingRules};
pub use trade::{Trade, TradeEntry, TradeFilter, TradeSide};
pub use user::{NewUser, User};
