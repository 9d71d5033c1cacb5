use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Manual,
    BacktestEnd,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeProfit => write!(f, "take_profit"),
            Self::StopLoss => write!(f, "stop_loss"),
            Self::Manual => write!(f, "manual"),
            Self::BacktestEnd => write!(f, "backtest_end"),
        }
    }
}

/// Outcome of a stop-loss/take-profit check against a live price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
}

impl From<ExitTrigger> for CloseReason {
    fn from(trigger: ExitTrigger) -> Self {
        match trigger {
            ExitTrigger::StopLoss => Self::StopLoss,
            ExitTrigger::TakeProfit => Self::TakeProfit,
        }
    }
}

/// An open position. At most one exists per symbol, and `entry_cost +
/// entry_fee` was debited from ledger capital when it was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub entry_cost: Decimal,
    pub entry_fee: Decimal,
    pub opened_at: DateTime<Utc>,
    pub reason: String,
}

impl Position {
    /// Price-movement `PnL` at `current_price`. Entry cost and entry fee are
    /// excluded here; both were already debited from capital at open, and the
    /// exit fee is deducted on close.
    #[must_use]
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        match self.direction {
            Direction::Long => (current_price - self.entry_price) * self.size,
            Direction::Short => (self.entry_price - current_price) * self.size,
        }
    }
}

/// Immutable record of a completed round trip.
///
/// `net_pnl` reconciles exactly with the capital delta applied over the
/// position's lifetime: `(exit_price * size - exit_fee) - entry_cost -
/// entry_fee`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub exit_price: Decimal,
    pub entry_cost: Decimal,
    pub entry_fee: Decimal,
    pub exit_fee: Decimal,
    pub gross_pnl: Decimal,
    pub net_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub reason: String,
    pub close_reason: CloseReason,
}

impl ClosedTrade {
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(direction: Direction) -> Position {
        Position {
            symbol: "BTCUSDT".to_string(),
            direction,
            size: dec!(0.5),
            entry_price: dec!(100),
            stop_loss_price: dec!(95),
            take_profit_price: dec!(110),
            entry_cost: dec!(50),
            entry_fee: dec!(0.05),
            opened_at: Utc::now(),
            reason: "test".to_string(),
        }
    }

    #[test]
    fn unrealized_pnl_long_gains_on_price_rise() {
        let pos = position(Direction::Long);
        assert_eq!(pos.unrealized_pnl(dec!(104)), dec!(2.0));
        assert_eq!(pos.unrealized_pnl(dec!(96)), dec!(-2.0));
    }

    #[test]
    fn unrealized_pnl_short_gains_on_price_drop() {
        let pos = position(Direction::Short);
        assert_eq!(pos.unrealized_pnl(dec!(96)), dec!(2.0));
        assert_eq!(pos.unrealized_pnl(dec!(104)), dec!(-2.0));
    }

    #[test]
    fn exit_trigger_maps_to_close_reason() {
        assert_eq!(
            CloseReason::from(ExitTrigger::StopLoss),
            CloseReason::StopLoss
        );
        assert_eq!(
            CloseReason::from(ExitTrigger::TakeProfit),
            CloseReason::TakeProfit
        );
    }

    #[test]
    fn direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::Long).unwrap();
        assert_eq!(json, "\"LONG\"");
        let reason = serde_json::to_string(&CloseReason::BacktestEnd).unwrap();
        assert_eq!(reason, "\"backtest_end\"");
    }
}
