pub mod equity_engine;
pub mod statistics;
