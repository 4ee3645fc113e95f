use crate::domain::services::statistics::{
    StatisticsConfig, DEFAULT_MAX_RISK_REWARD, DEFAULT_RISK_FREE_RATE,
};
use crate::persistence::DatabaseConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Background rollover job settings
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub max_consecutive_failures: u32,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            max_consecutive_failures: 5,
        }
    }
}

impl RolloverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct JournalConfig {
    pub database: DatabaseConfig,
    pub bind_address: SocketAddr,
    pub rollover: RolloverConfig,
    pub statistics: StatisticsConfig,
    pub max_request_body_bytes: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            rollover: RolloverConfig::default(),
            statistics: StatisticsConfig::default(),
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
        }
    }
}

impl JournalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; invalid values log a warning and keep the
    /// default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(value) if value > 0 => config.database.max_connections = value,
                _ => warn!(
                    "Invalid DATABASE_MAX_CONNECTIONS '{}', using default {}",
                    max, config.database.max_connections
                ),
            }
        }

        if let Some(log) = lookup("DATABASE_LOG_QUERIES") {
            config.database.log_queries = log.to_lowercase() == "true" || log == "1";
        }

        if let Some(addr) = lookup("BIND_ADDRESS") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.bind_address = value,
                Err(e) => warn!(
                    "Invalid BIND_ADDRESS '{}': {}, using default {}",
                    addr, e, DEFAULT_BIND_ADDRESS
                ),
            }
        }

        if let Some(enabled) = lookup("ROLLOVER_ENABLED") {
            config.rollover.enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        if let Some(interval) = lookup("ROLLOVER_INTERVAL_SECONDS") {
            match interval.parse::<u64>() {
                Ok(value) if (10..=86_400).contains(&value) => {
                    config.rollover.interval_seconds = value
                }
                _ => warn!(
                    "Invalid ROLLOVER_INTERVAL_SECONDS '{}' (expected 10-86400), using default {}",
                    interval, config.rollover.interval_seconds
                ),
            }
        }

        if let Some(max) = lookup("ROLLOVER_MAX_CONSECUTIVE_FAILURES") {
            match max.parse::<u32>() {
                Ok(value) if value > 0 => config.rollover.max_consecutive_failures = value,
                _ => warn!(
                    "Invalid ROLLOVER_MAX_CONSECUTIVE_FAILURES '{}', using default {}",
                    max, config.rollover.max_consecutive_failures
                ),
            }
        }

        if let Some(rate) = lookup("RISK_FREE_RATE") {
            match rate.parse::<f64>() {
                Ok(value) if value.is_finite() => config.statistics.risk_free_rate = value,
                _ => warn!(
                    "Invalid RISK_FREE_RATE '{}', using default {}",
                    rate, DEFAULT_RISK_FREE_RATE
                ),
            }
        }

        if let Some(ratio) = lookup("MAX_RISK_REWARD_RATIO") {
            match ratio.parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => {
                    config.statistics.max_risk_reward = value
                }
                _ => warn!(
                    "Invalid MAX_RISK_REWARD_RATIO '{}', using default {}",
                    ratio, DEFAULT_MAX_RISK_REWARD
                ),
            }
        }

        if let Some(limit) = lookup("MAX_REQUEST_BODY_BYTES") {
            match limit.parse::<usize>() {
                Ok(value) if value > 0 => config.max_request_body_bytes = value,
                _ => warn!(
                    "Invalid MAX_REQUEST_BODY_BYTES '{}', using default {}",
                    limit, DEFAULT_MAX_REQUEST_BODY_BYTES
                ),
            }
        }

        config
    }
}
