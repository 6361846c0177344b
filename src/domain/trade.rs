//! Trade Domain Types
//!
//! Side and lifecycle status of a journaled trade, plus the realized-PnL
//! rule applied at settlement.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction of a trade.
///
/// Parsed case-insensitively, stored and serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Realized profit/loss for a position of `size` entered at `entry_price`
    /// and exited at `exit_price`.
    pub fn realized_pnl(&self, entry_price: f64, exit_price: f64, size: f64) -> f64 {
        match self {
            Side::Buy => (exit_price - entry_price) * size,
            Side::Sell => (entry_price - exit_price) * size,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("invalid side '{}', expected buy or sell", other)),
        }
    }
}

/// Lifecycle status of a trade.
///
/// Only ever advances pending -> executed -> closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Executed,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Executed => "executed",
            TradeStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TradeStatus::Pending),
            "executed" => Ok(TradeStatus::Executed),
            "closed" => Ok(TradeStatus::Closed),
            other => Err(format!(
                "invalid status '{}', expected pending, executed or closed",
                other
            )),
        }
    }
}
