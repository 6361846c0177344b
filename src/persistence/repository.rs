//! Trade Ledger Repository
//!
//! Data access layer for journaled trades: lifecycle transitions, queries,
//! aggregate statistics, and export.

use super::models::{CreateTrade, PerformanceStats, TradeRecord, TRADE_FIELDS};
use super::{DbPool, LedgerError};
use crate::domain::trade::TradeStatus;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error};
use uuid::Uuid;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("invalid format '{}', expected csv or json", other)),
        }
    }
}

/// Single source of truth for trade state.
pub struct TradeLedger {
    pool: DbPool,
}

impl TradeLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a planned trade. The row starts out `pending` with no realized
    /// entry price.
    pub async fn create(&self, trade: CreateTrade) -> Result<TradeRecord, LedgerError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = sqlx::query_as::<_, TradeRecord>(
            r#"
            INSERT INTO trades (
                id, created_at, asset, side, planned_entry_price, size,
                reasoning, exit_logic, status, pre_trade_message
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(now)
        .bind(&trade.asset)
        .bind(trade.side)
        .bind(trade.planned_entry_price)
        .bind(trade.size)
        .bind(&trade.reasoning)
        .bind(&trade.exit_logic)
        .bind(&trade.pre_trade_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create trade: {}", e);
            LedgerError::QueryError(format!("Failed to create trade: {}", e))
        })?;

        debug!("Created trade: {} for {}", record.id, record.asset);
        Ok(record)
    }

    /// Transition a pending trade to `executed`, recording the actual fill
    /// price and the exchange order id if one exists.
    pub async fn mark_executed(
        &self,
        id: &str,
        executed_price: f64,
        order_id: Option<&str>,
    ) -> Result<TradeRecord, LedgerError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if current.status != TradeStatus::Pending {
            return Err(LedgerError::InvalidState(format!(
                "trade {} is {}, expected pending",
                id, current.status
            )));
        }

        let record = sqlx::query_as::<_, TradeRecord>(
            r#"
            UPDATE trades
            SET entry_price = ?1, status = 'executed', order_id = ?2
            WHERE id = ?3 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(executed_price)
        .bind(order_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to mark trade {} executed: {}", id, e);
            LedgerError::QueryError(format!("Failed to mark trade executed: {}", e))
        })?;

        debug!("Marked trade executed: {} @ {}", id, executed_price);
        Ok(record)
    }

    /// Close a trade at `exit_price`, computing realized PnL from the
    /// recorded fill price. Fails if the trade is unknown, never executed,
    /// or already closed.
    pub async fn settle(
        &self,
        id: &str,
        exit_price: f64,
        note: Option<&str>,
    ) -> Result<TradeRecord, LedgerError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        if current.status == TradeStatus::Closed {
            return Err(LedgerError::InvalidState(format!(
                "trade {} is already closed",
                id
            )));
        }

        let entry_price = current.entry_price.ok_or_else(|| {
            LedgerError::InvalidState(format!("trade {} has no entry price recorded yet", id))
        })?;

        let pnl = current.side.realized_pnl(entry_price, exit_price, current.size);
        let exit_time = Utc::now();

        let record = sqlx::query_as::<_, TradeRecord>(
            r#"
            UPDATE trades
            SET exit_price = ?1, exit_time = ?2, realized_pnl = ?3,
                status = 'closed', exit_note = ?4
            WHERE id = ?5 AND status = 'executed'
            RETURNING *
            "#,
        )
        .bind(exit_price)
        .bind(exit_time)
        .bind(pnl)
        .bind(note)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to settle trade {}: {}", id, e);
            LedgerError::QueryError(format!("Failed to settle trade: {}", e))
        })?;

        debug!("Settled trade {} with realized pnl {}", id, pnl);
        Ok(record)
    }

    /// Get trade by ID
    pub async fn get(&self, id: &str) -> Result<Option<TradeRecord>, LedgerError> {
        let record = sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get trade {}: {}", id, e);
                LedgerError::QueryError(format!("Failed to get trade: {}", e))
            })?;

        Ok(record)
    }

    /// List trades newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<TradeStatus>,
    ) -> Result<Vec<TradeRecord>, LedgerError> {
        let records = match status {
            Some(status) => {
                sqlx::query_as::<_, TradeRecord>(
                    "SELECT * FROM trades WHERE status = ?1 ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            error!("Failed to list trades: {}", e);
            LedgerError::QueryError(format!("Failed to list trades: {}", e))
        })?;

        Ok(records)
    }

    /// Aggregate performance over all settled trades.
    pub async fn stats(&self) -> Result<PerformanceStats, LedgerError> {
        let rows: Vec<(f64,)> =
            sqlx::query_as("SELECT realized_pnl FROM trades WHERE realized_pnl IS NOT NULL")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to compute stats: {}", e);
                    LedgerError::QueryError(format!("Failed to compute stats: {}", e))
                })?;

        let realized: Vec<f64> = rows.into_iter().map(|(pnl,)| pnl).collect();
        let trades = realized.len() as i64;
        let wins = realized.iter().filter(|p| **p > 0.0).count() as i64;
        let losses = realized.iter().filter(|p| **p < 0.0).count() as i64;
        let total_pnl: f64 = realized.iter().sum();
        let (average_pnl, win_rate) = if trades > 0 {
            (total_pnl / trades as f64, wins as f64 / trades as f64 * 100.0)
        } else {
            (0.0, 0.0)
        };

        Ok(PerformanceStats {
            trades,
            total_pnl,
            average_pnl,
            wins,
            losses,
            win_rate,
        })
    }

    /// Export the full journal to `path`, creating parent directories and
    /// overwriting any existing file. Column order is `TRADE_FIELDS` in both
    /// formats.
    pub async fn export(&self, path: &Path, format: ExportFormat) -> Result<PathBuf, LedgerError> {
        let trades = self.list(None).await?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LedgerError::ExportError(e.to_string()))?;
            }
        }

        match format {
            ExportFormat::Json => {
                let body = serde_json::to_string_pretty(&trades)
                    .map_err(|e| LedgerError::ExportError(e.to_string()))?;
                std::fs::write(path, body).map_err(|e| LedgerError::ExportError(e.to_string()))?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_path(path)
                    .map_err(|e| LedgerError::ExportError(e.to_string()))?;
                writer
                    .write_record(TRADE_FIELDS)
                    .map_err(|e| LedgerError::ExportError(e.to_string()))?;
                for trade in &trades {
                    writer
                        .serialize(trade)
                        .map_err(|e| LedgerError::ExportError(e.to_string()))?;
                }
                writer
                    .flush()
                    .map_err(|e| LedgerError::ExportError(e.to_string()))?;
            }
        }

        debug!("Exported {} trades to {}", trades.len(), path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Side;
    use crate::persistence::init_database;

    async fn ledger() -> TradeLedger {
        let pool = init_database("sqlite::memory:").await.unwrap();
        TradeLedger::new(pool)
    }

    fn sample_trade() -> CreateTrade {
        CreateTrade {
            asset: "BTCBRL".to_string(),
            side: Side::Buy,
            planned_entry_price: 300000.0,
            size: 0.01,
            reasoning: "support held on the daily".to_string(),
            exit_logic: "take profit at 305k, stop at 295k".to_string(),
            pre_trade_message: "plan: long BTCBRL".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let ledger = ledger().await;

        let created = ledger.create(sample_trade()).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.status, TradeStatus::Pending);
        assert_eq!(created.planned_entry_price, 300000.0);
        assert_eq!(created.entry_price, None);
        assert_eq!(created.realized_pnl, None);

        let fetched = ledger.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.asset, "BTCBRL");
    }

    #[tokio::test]
    async fn test_mark_executed_records_fill() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();

        let executed = ledger
            .mark_executed(&created.id, 301000.0, Some("mb-42"))
            .await
            .unwrap();
        assert_eq!(executed.status, TradeStatus::Executed);
        assert_eq!(executed.entry_price, Some(301000.0));
        assert_eq!(executed.order_id.as_deref(), Some("mb-42"));
        // planned price is untouched
        assert_eq!(executed.planned_entry_price, 300000.0);
    }

    #[tokio::test]
    async fn test_mark_executed_unknown_id() {
        let ledger = ledger().await;

        let err = ledger.mark_executed("no-such-id", 1.0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_executed_twice_rejected() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&created.id, 301000.0, None).await.unwrap();

        let err = ledger
            .mark_executed(&created.id, 302000.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));

        // first fill stands
        let record = ledger.get(&created.id).await.unwrap().unwrap();
        assert_eq!(record.entry_price, Some(301000.0));
    }

    #[tokio::test]
    async fn test_settle_computes_buy_pnl() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&created.id, 301000.0, None).await.unwrap();

        let settled = ledger
            .settle(&created.id, 305000.0, Some("target hit"))
            .await
            .unwrap();
        assert_eq!(settled.status, TradeStatus::Closed);
        assert_eq!(settled.exit_price, Some(305000.0));
        assert_eq!(settled.realized_pnl, Some(40.0));
        assert_eq!(settled.exit_note.as_deref(), Some("target hit"));
        assert!(settled.exit_time.is_some());
    }

    #[tokio::test]
    async fn test_settle_computes_sell_pnl() {
        let ledger = ledger().await;
        let mut trade = sample_trade();
        trade.side = Side::Sell;
        let created = ledger.create(trade).await.unwrap();
        ledger.mark_executed(&created.id, 301000.0, None).await.unwrap();

        let settled = ledger.settle(&created.id, 305000.0, None).await.unwrap();
        assert_eq!(settled.realized_pnl, Some(-40.0));
    }

    #[tokio::test]
    async fn test_settle_unknown_id_mutates_nothing() {
        let ledger = ledger().await;
        ledger.create(sample_trade()).await.unwrap();

        let err = ledger.settle("no-such-id", 1.0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let trades = ledger.list(None).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, TradeStatus::Pending);
    }

    #[tokio::test]
    async fn test_settle_without_entry_price_rejected() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();

        let err = ledger.settle(&created.id, 305000.0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));

        let record = ledger.get(&created.id).await.unwrap().unwrap();
        assert_eq!(record.status, TradeStatus::Pending);
        assert_eq!(record.realized_pnl, None);
    }

    #[tokio::test]
    async fn test_closed_trades_are_immutable() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&created.id, 301000.0, None).await.unwrap();
        let settled = ledger.settle(&created.id, 305000.0, None).await.unwrap();

        let err = ledger.settle(&created.id, 310000.0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
        let err = ledger.mark_executed(&created.id, 1.0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));

        let record = ledger.get(&created.id).await.unwrap().unwrap();
        assert_eq!(record.realized_pnl, settled.realized_pnl);
        assert_eq!(record.exit_price, settled.exit_price);
        assert_eq!(record.exit_time, settled.exit_time);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter() {
        let ledger = ledger().await;
        let first = ledger.create(sample_trade()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&second.id, 301000.0, None).await.unwrap();

        let all = ledger.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let pending = ledger.list(Some(TradeStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);
    }

    #[tokio::test]
    async fn test_stats_empty_ledger() {
        let ledger = ledger().await;

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.trades, 0);
        assert_eq!(stats.total_pnl, 0.0);
        assert_eq!(stats.average_pnl, 0.0);
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.win_rate, 0.0);
    }

    #[tokio::test]
    async fn test_stats_single_winning_trade() {
        let ledger = ledger().await;
        let created = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&created.id, 301000.0, None).await.unwrap();
        ledger.settle(&created.id, 305000.0, None).await.unwrap();

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.trades, 1);
        assert_eq!(stats.total_pnl, 40.0);
        assert_eq!(stats.average_pnl, 40.0);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.win_rate, 100.0);
    }

    #[tokio::test]
    async fn test_stats_counts_flat_trades() {
        let ledger = ledger().await;

        // win
        let win = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&win.id, 300000.0, None).await.unwrap();
        ledger.settle(&win.id, 305000.0, None).await.unwrap();
        // loss
        let loss = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&loss.id, 300000.0, None).await.unwrap();
        ledger.settle(&loss.id, 295000.0, None).await.unwrap();
        // flat: counted in trades but neither win nor loss
        let flat = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&flat.id, 300000.0, None).await.unwrap();
        ledger.settle(&flat.id, 300000.0, None).await.unwrap();

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.trades, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_export_round_trips_both_formats() {
        let ledger = ledger().await;
        let open = ledger.create(sample_trade()).await.unwrap();
        let closed = ledger.create(sample_trade()).await.unwrap();
        ledger.mark_executed(&closed.id, 301000.0, Some("mb-7")).await.unwrap();
        ledger.settle(&closed.id, 305000.0, Some("done")).await.unwrap();

        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("exports/trades.json");
        let written = ledger.export(&json_path, ExportFormat::Json).await.unwrap();
        assert_eq!(written, json_path);
        let body = std::fs::read_to_string(&json_path).unwrap();
        let parsed: Vec<TradeRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 2);
        // nulls preserved as null
        assert!(body.contains("\"realized_pnl\": null"));

        let csv_path = dir.path().join("exports/trades.csv");
        ledger.export(&csv_path, ExportFormat::Csv).await.unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            TRADE_FIELDS
        );
        let rows: Vec<TradeRecord> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);

        // same records, same values, modulo null representation
        for (json_row, csv_row) in parsed.iter().zip(rows.iter()) {
            assert_eq!(json_row.id, csv_row.id);
            assert_eq!(json_row.status, csv_row.status);
            assert_eq!(json_row.realized_pnl, csv_row.realized_pnl);
            assert_eq!(json_row.order_id, csv_row.order_id);
        }
        assert!(parsed.iter().any(|t| t.id == open.id));
    }

    #[tokio::test]
    async fn test_export_overwrites_existing_file() {
        let ledger = ledger().await;
        ledger.create(sample_trade()).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.json");
        std::fs::write(&path, "stale").unwrap();

        ledger.export(&path, ExportFormat::Json).await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with('['));
    }
}
