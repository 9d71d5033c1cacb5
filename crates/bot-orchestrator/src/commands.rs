use paper_trade_core::config::ExecutionMode;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::oneshot;

/// Control messages accepted by a running trader actor.
#[derive(Debug)]
pub enum TraderCommand {
    /// Force-closes open positions at the last known prices and exits.
    Stop,
    GetStatus(oneshot::Sender<TraderStatus>),
}

/// Point-in-time snapshot of the trader's books.
///
/// PnL and drawdown are marked against the latest prices the signal loop
/// has seen, so they include unrealized movement on open positions.
#[derive(Debug, Clone, Serialize)]
pub struct TraderStatus {
    pub mode: ExecutionMode,
    pub capital: Decimal,
    pub total_pnl: Decimal,
    pub drawdown_pct: Decimal,
    pub open_positions: usize,
    pub open_symbols: Vec<String>,
    pub total_trades: usize,
}
