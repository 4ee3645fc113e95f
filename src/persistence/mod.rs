//! Persistence Layer
//!
//! SQLite storage for users, account records and the trade ledger, with
//! async access via sqlx.
//!
//! # Database Schema
//!
//! ## Users Table
//! - id: Integer primary key
//! - username, email: unique
//! - password_hash: opaque string
//! - created_at: Timestamp
//!
//! ## Accounts Table
//! - user_id: Primary key, references users
//! - broker_name, platform: Optional text
//! - rules_json: Trading rules as JSON
//! - starting_balance_cents, balance_cents, equity_cents: Integer cents
//! - last_update_date: Date of the last balance rollover
//! - updated_at: Timestamp
//!
//! ## Trades Table
//! - id: Integer primary key
//! - user_id: References users
//! - ticket, item, trade_type ("Buy" or "Sell"), size
//! - open_time, close_time: Timestamps
//! - *_hundredths: Prices as integer hundredths
//! - *_cents: Fees and profit as integer cents
//! - screenshot_1..3: Stored file names
//! - pips, duration_seconds: Derived on write

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// How long a connection waits on another process holding the write lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    /// A UNIQUE constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored row could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Initialize the database with default pool settings
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    connect(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

/// Open the connection pool and run migrations
///
/// # Errors
/// Returns error if the database directory cannot be created, the
/// connection fails, or a migration fails
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let options = if config.log_queries {
        options.log_statements(tracing::log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    // Every connection to an in-memory database sees its own empty
    // database, so the pool must hold exactly one that never closes.
    let pool_options = if is_in_memory(&config.url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "accounts table",
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            user_id INTEGER PRIMARY KEY,
            broker_name TEXT,
            platform TEXT,
            rules_json TEXT NOT NULL DEFAULT '{}',
            starting_balance_cents INTEGER NOT NULL DEFAULT 0,
            balance_cents INTEGER NOT NULL DEFAULT 0,
            equity_cents INTEGER NOT NULL DEFAULT 0,
            last_update_date DATE NOT NULL,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "trades table",
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            ticket TEXT NOT NULL,
            open_time DATETIME NOT NULL,
            close_time DATETIME,
            trade_type TEXT NOT NULL CHECK(trade_type IN ('Buy', 'Sell')),
            size REAL NOT NULL,
            item TEXT NOT NULL,
            price_hundredths INTEGER NOT NULL,
            stop_loss_hundredths INTEGER,
            take_profit_hundredths INTEGER,
            close_price_hundredths INTEGER,
            commission_cents INTEGER NOT NULL DEFAULT 0,
            taxes_cents INTEGER NOT NULL DEFAULT 0,
            swap_cents INTEGER NOT NULL DEFAULT 0,
            profit_cents INTEGER NOT NULL DEFAULT 0,
            comments TEXT,
            strategy TEXT,
            screenshot_1 TEXT,
            screenshot_2 TEXT,
            screenshot_3 TEXT,
            pips INTEGER,
            duration_seconds INTEGER,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "trades user/open_time index",
        "CREATE INDEX IF NOT EXISTS idx_trades_user_open_time ON trades(user_id, open_time)",
    ),
    (
        "trades ticket index",
        "CREATE INDEX IF NOT EXISTS idx_trades_ticket ON trades(ticket)",
    ),
];

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    for (name, statement) in MIGRATIONS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create {}: {}", name, e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/tradepilot.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Log SQL statements at debug level
    pub log_queries: bool,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/tradepilot.db";

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}
