//! TradePilot journal library
//!
//! Trade ledger, equity reconciliation and trading statistics behind a JSON
//! HTTP API.

pub mod application;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod task_runner;
