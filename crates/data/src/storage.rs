//! JSON-backed trade history.
//!
//! Every completed trade is appended to an in-memory list and the whole
//! history is flushed to disk, so the file is always a complete record.
//! Writes go through a temp file and a rename; a crash mid-save leaves
//! the previous history intact.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use paper_trade_core::config::StorageConfig;
use paper_trade_core::position::ClosedTrade;
use paper_trade_core::traits::TradeStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("trade storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trade storage serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trade export error: {0}")]
    Csv(#[from] csv::Error),
}

/// On-disk envelope around the trade list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TradesFile {
    last_updated: DateTime<Utc>,
    total_trades: usize,
    trades: Vec<ClosedTrade>,
}

/// Aggregate performance across the stored history.
///
/// A break-even trade counts toward `total_trades` but toward neither
/// `winning_trades` nor `losing_trades`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage of all trades that closed with positive net PnL.
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
    pub best_trade: Option<ClosedTrade>,
    pub worst_trade: Option<ClosedTrade>,
}

/// Trade history persisted as pretty-printed JSON.
///
/// Construction loads whatever is already on disk; a missing or
/// unreadable file starts an empty history rather than failing, so a
/// corrupt file never blocks trading.
pub struct JsonTradeStore {
    path: PathBuf,
    trades: RwLock<Vec<ClosedTrade>>,
}

impl JsonTradeStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let trades = Self::load(&path);
        Self {
            path,
            trades: RwLock::new(trades),
        }
    }

    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.trades_file)
    }

    /// Snapshot of the stored history, oldest first.
    #[must_use]
    pub fn trades(&self) -> Vec<ClosedTrade> {
        self.trades.read().clone()
    }

    #[must_use]
    pub fn statistics(&self) -> TradeStatistics {
        let trades = self.trades.read();
        if trades.is_empty() {
            return TradeStatistics::default();
        }

        let total = trades.len();
        let winning = trades.iter().filter(|t| t.net_pnl > Decimal::ZERO).count();
        let losing = trades.iter().filter(|t| t.net_pnl < Decimal::ZERO).count();
        let total_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();

        TradeStatistics {
            total_trades: total,
            winning_trades: winning,
            losing_trades: losing,
            win_rate: winning as f64 / total as f64 * 100.0,
            total_pnl,
            average_pnl: total_pnl / Decimal::from(total as u64),
            best_trade: trades.iter().max_by_key(|t| t.net_pnl).cloned(),
            worst_trade: trades.iter().min_by_key(|t| t.net_pnl).cloned(),
        }
    }

    /// Writes the history to `path` as CSV, one row per trade.
    ///
    /// An empty history writes nothing and leaves no file behind.
    pub fn export_csv(&self, path: &Path) -> Result<(), StorageError> {
        let trades = self.trades.read();
        if trades.is_empty() {
            warn!("no trades to export");
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(path)?;
        for trade in trades.iter() {
            writer.serialize(trade)?;
        }
        writer.flush()?;

        info!(
            path = %path.display(),
            rows = trades.len(),
            "exported trade history"
        );
        Ok(())
    }

    fn load(path: &Path) -> Vec<ClosedTrade> {
        if !path.exists() {
            info!(path = %path.display(), "no trade history file, starting fresh");
            return Vec::new();
        }

        match Self::read_file(path) {
            Ok(file) => {
                info!(
                    path = %path.display(),
                    trades = file.trades.len(),
                    "loaded trade history"
                );
                file.trades
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "trade history unreadable, starting fresh"
                );
                Vec::new()
            }
        }
    }

    fn read_file(path: &Path) -> Result<TradesFile, StorageError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    fn save(&self, trades: &[ClosedTrade]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let envelope = TradesFile {
            last_updated: Utc::now(),
            total_trades: trades.len(),
            trades: trades.to_vec(),
        };

        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &envelope)?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TradeStore for JsonTradeStore {
    fn add_trade(&self, trade: &ClosedTrade) -> Result<()> {
        let mut trades = self.trades.write();
        trades.push(trade.clone());
        // The trade stays in memory even if the flush fails; the next
        // successful save persists it.
        self.save(&trades)?;
        info!(
            symbol = %trade.symbol,
            direction = %trade.direction,
            net_pnl = %trade.net_pnl,
            total = trades.len(),
            "trade recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paper_trade_core::position::{CloseReason, Direction};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn sample_trade(symbol: &str, net_pnl: Decimal) -> ClosedTrade {
        let opened_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let closed_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 45, 0).unwrap();
        ClosedTrade {
            symbol: symbol.to_string(),
            direction: Direction::Long,
            size: dec!(0.5),
            entry_price: dec!(100),
            stop_loss_price: dec!(95),
            take_profit_price: dec!(110),
            exit_price: dec!(104),
            entry_cost: dec!(50),
            entry_fee: dec!(0.05),
            exit_fee: dec!(0.052),
            gross_pnl: dec!(2),
            net_pnl,
            opened_at,
            closed_at,
            duration_secs: 2700,
            reason: "test entry".to_string(),
            close_reason: CloseReason::TakeProfit,
        }
    }

    // ==================== Construction Tests ====================

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));
        assert!(store.trades().is_empty());
    }

    #[test]
    fn reload_restores_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");

        let store = JsonTradeStore::new(&path);
        store.add_trade(&sample_trade("BTCUSDT", dec!(5))).unwrap();
        store.add_trade(&sample_trade("ETHUSDT", dec!(-2))).unwrap();
        drop(store);

        let reloaded = JsonTradeStore::new(&path);
        let trades = reloaded.trades();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].symbol, "BTCUSDT");
        assert_eq!(trades[1].net_pnl, dec!(-2));
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");
        fs::write(&path, "{ not json at all").unwrap();

        let store = JsonTradeStore::new(&path);
        assert!(store.trades().is_empty());
    }

    #[test]
    fn empty_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");
        fs::write(&path, "").unwrap();

        let store = JsonTradeStore::new(&path);
        assert!(store.trades().is_empty());
    }

    #[test]
    fn wrong_structure_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");
        fs::write(&path, r#"{"positions": [1, 2, 3]}"#).unwrap();

        let store = JsonTradeStore::new(&path);
        assert!(store.trades().is_empty());
    }

    // ==================== Persistence Tests ====================

    #[test]
    fn saved_file_carries_envelope_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");

        let store = JsonTradeStore::new(&path);
        store.add_trade(&sample_trade("BTCUSDT", dec!(1))).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("last_updated").is_some());
        assert_eq!(value["total_trades"], 1);
        assert_eq!(value["trades"].as_array().unwrap().len(), 1);
        assert_eq!(value["trades"][0]["symbol"], "BTCUSDT");
        assert_eq!(value["trades"][0]["direction"], "LONG");
        assert_eq!(value["trades"][0]["close_reason"], "take_profit");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join("trades.json");

        let store = JsonTradeStore::new(&path);
        store.add_trade(&sample_trade("SOLUSDT", dec!(3))).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");

        let store = JsonTradeStore::new(&path);
        store.add_trade(&sample_trade("BTCUSDT", dec!(1))).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    // ==================== Statistics Tests ====================

    #[test]
    fn statistics_empty_history_is_zeroed() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));

        let stats = store.statistics();
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.winning_trades, 0);
        assert_eq!(stats.losing_trades, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.total_pnl, Decimal::ZERO);
        assert!(stats.best_trade.is_none());
        assert!(stats.worst_trade.is_none());
    }

    #[test]
    fn statistics_mixed_history() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));
        store.add_trade(&sample_trade("BTCUSDT", dec!(5))).unwrap();
        store.add_trade(&sample_trade("ETHUSDT", dec!(1))).unwrap();
        store.add_trade(&sample_trade("SOLUSDT", dec!(-2))).unwrap();

        let stats = store.statistics();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert!((stats.win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.total_pnl, dec!(4));
        assert_eq!(stats.average_pnl, dec!(4) / dec!(3));
        assert_eq!(stats.best_trade.unwrap().net_pnl, dec!(5));
        assert_eq!(stats.worst_trade.unwrap().net_pnl, dec!(-2));
    }

    #[test]
    fn break_even_trade_is_neither_win_nor_loss() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));
        store.add_trade(&sample_trade("BTCUSDT", dec!(0))).unwrap();

        let stats = store.statistics();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.winning_trades, 0);
        assert_eq!(stats.losing_trades, 0);
        assert_eq!(stats.win_rate, 0.0);
    }

    // ==================== Export Tests ====================

    #[test]
    fn export_csv_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));
        store.add_trade(&sample_trade("BTCUSDT", dec!(5))).unwrap();
        store.add_trade(&sample_trade("ETHUSDT", dec!(-1))).unwrap();

        let csv_path = dir.path().join("trades.csv");
        store.export_csv(&csv_path).unwrap();

        let raw = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("symbol"));
        assert!(lines[0].contains("net_pnl"));
        assert!(lines[1].contains("BTCUSDT"));
        assert!(lines[2].contains("ETHUSDT"));
    }

    #[test]
    fn export_csv_empty_history_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));

        let csv_path = dir.path().join("trades.csv");
        store.export_csv(&csv_path).unwrap();

        assert!(!csv_path.exists());
    }
}
