//! Database Models
//!
//! Persistent data structures for journaled trades.

use crate::domain::trade::{Side, TradeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Canonical column order for exports, matching the `TradeRecord` field
/// declaration order. Both export formats derive their layout from the same
/// declaration, so this constant pins the contract down for tests and for
/// the CSV header row.
pub const TRADE_FIELDS: [&str; 16] = [
    "id",
    "created_at",
    "asset",
    "side",
    "planned_entry_price",
    "size",
    "reasoning",
    "exit_logic",
    "status",
    "pre_trade_message",
    "order_id",
    "entry_price",
    "exit_price",
    "exit_time",
    "realized_pnl",
    "exit_note",
];

/// Trade record in database
///
/// Descriptive fields are immutable after creation; lifecycle fields are
/// mutated only by the execute and settle transitions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub asset: String,
    pub side: Side,
    pub planned_entry_price: f64,
    pub size: f64,
    pub reasoning: String,
    pub exit_logic: String,
    pub status: TradeStatus,
    pub pre_trade_message: String,
    pub order_id: Option<String>,
    /// Realized fill price; null until the trade is executed
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Null until closed, immutable once set
    pub realized_pnl: Option<f64>,
    pub exit_note: Option<String>,
}

/// Create trade input
#[derive(Debug, Clone)]
pub struct CreateTrade {
    pub asset: String,
    pub side: Side,
    pub planned_entry_price: f64,
    pub size: f64,
    pub reasoning: String,
    pub exit_logic: String,
    pub pre_trade_message: String,
}

/// Aggregate performance over all settled trades
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub trades: i64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
}
