use chrono::{DateTime, Utc};
use paper_trade_core::position::ClosedTrade;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// One point of the replay equity curve. Equity here is realized
/// capital only; an open position shows up as the entry debit until it
/// closes.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub price: Decimal,
}

/// Replay outcome: closed trades, the per-candle equity curve, and the
/// aggregate performance numbers derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Trades that did not win; break-even trades land here.
    pub losing_trades: usize,
    /// Winning trades over total, in percent.
    pub win_rate: f64,
    pub total_pnl: Decimal,
    /// Net PnL over initial capital, in percent.
    pub total_return: f64,
    /// Deepest peak-to-trough equity decline, in percent.
    pub max_drawdown: f64,
    /// Annualized mean-over-std of per-candle equity returns.
    pub sharpe_ratio: f64,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub(crate) fn build(
        symbol: &str,
        trades: Vec<ClosedTrade>,
        equity_curve: Vec<EquityPoint>,
        initial_capital: Decimal,
        final_capital: Decimal,
    ) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades
            .iter()
            .filter(|t| t.net_pnl > Decimal::ZERO)
            .count();
        let losing_trades = total_trades - winning_trades;

        #[allow(clippy::cast_precision_loss)]
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let total_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();
        let total_return = if initial_capital > Decimal::ZERO {
            (total_pnl / initial_capital * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let equity_values: Vec<f64> = equity_curve
            .iter()
            .map(|p| p.equity.to_f64().unwrap_or(0.0))
            .collect();

        Self {
            symbol: symbol.to_string(),
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl,
            total_return,
            max_drawdown: max_drawdown_pct(&equity_values),
            sharpe_ratio: sharpe_ratio(&equity_values),
            initial_capital,
            final_capital,
            trades,
            equity_curve,
        }
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "═══════════════════════════════════════════════════════════════"
        )?;
        writeln!(
            f,
            "                    BACKTEST RESULTS                           "
        )?;
        writeln!(
            f,
            "═══════════════════════════════════════════════════════════════"
        )?;
        writeln!(f)?;
        writeln!(f, "Symbol:                {}", self.symbol)?;
        writeln!(f, "Initial Capital:       ${:.2}", self.initial_capital)?;
        writeln!(f, "Final Capital:         ${:.2}", self.final_capital)?;
        writeln!(f, "Total PnL:             ${:.2}", self.total_pnl)?;
        writeln!(f, "Total Return:          {:.2}%", self.total_return)?;
        writeln!(f, "Max Drawdown:          {:.2}%", self.max_drawdown)?;
        writeln!(f, "Sharpe Ratio:          {:.2}", self.sharpe_ratio)?;
        writeln!(f)?;
        writeln!(f, "Total Trades:          {}", self.total_trades)?;
        writeln!(f, "Winning Trades:        {}", self.winning_trades)?;
        writeln!(f, "Losing Trades:         {}", self.losing_trades)?;
        write!(f, "Win Rate:              {:.2}%", self.win_rate)
    }
}

/// Largest percentage decline from a running equity peak. The peak
/// starts at the first value and only ratchets up.
fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_drawdown = 0.0f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (peak - value) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }
    max_drawdown
}

/// Annualized Sharpe over per-step equity returns, population standard
/// deviation, zero risk-free rate. Steps starting from non-positive
/// equity are skipped; a flat curve reads as zero.
fn sharpe_ratio(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let mut returns = Vec::with_capacity(equity.len() - 1);
    for pair in equity.windows(2) {
        if pair[0] > 0.0 {
            returns.push((pair[1] - pair[0]) / pair[0]);
        }
    }
    if returns.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std > 0.0 {
        mean / std * 252.0f64.sqrt()
    } else {
        0.0
    }
}
