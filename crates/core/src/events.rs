use crate::position::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Symbol -> latest price, as fetched by the orchestrator each cycle.
pub type PriceMap = HashMap<String, Decimal>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Long,
    Short,
    Flat,
}

impl SignalAction {
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Long => Some(Direction::Long),
            Self::Short => Some(Direction::Short),
            Self::Flat => None,
        }
    }
}

/// A trade proposal emitted by a strategy. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    pub confidence: f64,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub reason: String,
}

/// Latest technical indicator values for one symbol, computed over a
/// trailing candle window. Indicator values are `f64`; only the reference
/// price stays `Decimal` so signals carry it through unrounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub current_price: Decimal,
    pub rsi_14: f64,
    pub rsi_7: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_position: f64,
    pub atr: f64,
    pub volume_ratio: f64,
    pub volatility: f64,
    pub z_score: f64,
    pub momentum: f64,
}

impl IndicatorSnapshot {
    /// Neutral snapshot used when there is not enough history to compute
    /// real indicators: RSI at midline, MACD flat, bands collapsed onto the
    /// price, ATR at 1% of price.
    #[must_use]
    pub fn neutral(current_price: Decimal) -> Self {
        let price = current_price.to_f64().unwrap_or(0.0);
        Self {
            current_price,
            rsi_14: 50.0,
            rsi_7: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            bb_upper: price,
            bb_middle: price,
            bb_lower: price,
            bb_position: 0.5,
            atr: price * 0.01,
            volume_ratio: 1.0,
            volatility: 0.01,
            z_score: 0.0,
            momentum: 1.0,
        }
    }
}

/// Request to enter a position at `desired_price`. `fallback_price` is
/// substituted when the desired price is non-positive (e.g. a signal built
/// from degenerate indicator data).
#[derive(Debug, Clone)]
pub struct EntryOrder {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub desired_price: Decimal,
    pub fallback_price: Option<Decimal>,
}

/// Request to exit an open position at `desired_price`.
#[derive(Debug, Clone)]
pub struct ExitOrder {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub desired_price: Decimal,
}

/// Result of a (simulated or live) order execution.
///
/// `total_cost` is `filled_price * size + fee`. Both fee and total cost
/// are informational; the risk ledger recomputes its own debits and
/// credits from the same configured fee rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub filled_price: Decimal,
    pub fee: Decimal,
    pub total_cost: Decimal,
    pub slippage: f64,
    pub timestamp: DateTime<Utc>,
}
