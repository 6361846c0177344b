//! Persistence Layer
//!
//! SQLite-backed storage for the trade ledger, with async access via sqlx.
//! One row per trade; every mutation is committed before the call returns,
//! so the journal can be reopened across separate CLI invocations.
//!
//! # Database Schema
//!
//! ## Trades Table
//! - id: UUID
//! - created_at: Timestamp (UTC)
//! - asset: Trading symbol (e.g., "BTCBRL")
//! - side: "buy" or "sell"
//! - planned_entry_price / size: the plan as recorded
//! - reasoning / exit_logic / pre_trade_message: the trade thesis
//! - status: "pending", "executed", "closed"
//! - order_id: exchange order id, set on execution
//! - entry_price: realized fill price, set on execution
//! - exit_price / exit_time / realized_pnl / exit_note: set on settlement

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Errors raised by ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Trade {0} not found")]
    NotFound(String),

    #[error("Invalid trade state: {0}")]
    InvalidState(String),

    #[error("Export error: {0}")]
    ExportError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/trades.db")
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, LedgerError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            created_at DATETIME NOT NULL,
            asset TEXT NOT NULL,
            side TEXT NOT NULL CHECK(side IN ('buy', 'sell')),
            planned_entry_price REAL NOT NULL,
            size REAL NOT NULL,
            reasoning TEXT NOT NULL,
            exit_logic TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'executed', 'closed')),
            pre_trade_message TEXT NOT NULL,
            order_id TEXT,
            entry_price REAL,
            exit_price REAL,
            exit_time DATETIME,
            realized_pnl REAL,
            exit_note TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LedgerError::MigrationError(format!("Failed to create trades table: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_created_at ON trades(created_at)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::MigrationError(format!("Failed to create index: {}", e)))?;

    Ok(())
}
