use crate::error::RiskError;
use chrono::{DateTime, Utc};
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::PriceMap;
use paper_trade_core::position::{CloseReason, ClosedTrade, Direction, ExitTrigger, Position};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

/// Parameters for opening a position. Stop and take-profit levels are
/// required; the orchestrator substitutes defaults before calling in.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub symbol: String,
    pub direction: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub reason: String,
}

/// Authoritative owner of capital, open positions, trade history, and the
/// drawdown/daily-loss gates. All capital debits and credits happen here
/// and nowhere else.
///
/// `current_capital` is realized only. Equity adds the price-movement PnL
/// of open positions on top; the drawdown gate measures against equity, so
/// `peak_capital >= current_capital` is not guaranteed instant-by-instant.
pub struct RiskLedger {
    initial_capital: Decimal,
    max_drawdown_pct: Decimal,
    max_daily_loss_pct: Decimal,
    max_daily_trades: u32,
    fee_rate: Decimal,
    current_capital: Decimal,
    peak_capital: Decimal,
    open_positions: HashMap<String, Position>,
    trade_history: Vec<ClosedTrade>,
    daily_period_start: DateTime<Utc>,
    daily_trade_count: u32,
    daily_realized_pnl: Decimal,
}

impl RiskLedger {
    /// Creates a ledger with the default 0.1% per-side fee rate.
    #[must_use]
    pub fn new(
        initial_capital: Decimal,
        max_drawdown_pct: f64,
        max_daily_loss_pct: f64,
        max_daily_trades: u32,
    ) -> Self {
        Self {
            initial_capital,
            max_drawdown_pct: Decimal::try_from(max_drawdown_pct).unwrap_or_default(),
            max_daily_loss_pct: Decimal::try_from(max_daily_loss_pct).unwrap_or_default(),
            max_daily_trades,
            fee_rate: Decimal::new(1, 3),
            current_capital: initial_capital,
            peak_capital: initial_capital,
            open_positions: HashMap::new(),
            trade_history: Vec::new(),
            daily_period_start: Utc::now(),
            daily_trade_count: 0,
            daily_realized_pnl: Decimal::ZERO,
        }
    }

    /// Overrides the fee rate. The execution simulator must be configured
    /// with the same rate so its informational fees agree with the ledger's.
    #[must_use]
    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = Decimal::try_from(fee_rate).unwrap_or_default();
        self
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.trading.initial_capital,
            config.risk.max_drawdown_pct,
            config.risk.max_daily_loss_pct,
            config.risk.max_daily_trades,
        )
        .with_fee_rate(config.trading.fee_rate)
    }

    /// Realized capital plus price-movement PnL of open positions. Symbols
    /// missing from `prices` contribute zero unrealized PnL (valued at
    /// entry).
    #[must_use]
    pub fn equity(&self, prices: &PriceMap) -> Decimal {
        let mut equity = self.current_capital;
        for position in self.open_positions.values() {
            let price = prices
                .get(&position.symbol)
                .copied()
                .unwrap_or(position.entry_price);
            equity += position.unrealized_pnl(price);
        }
        equity
    }

    /// Gate for new opens. Ratchets the equity high-water mark, then checks
    /// drawdown, daily loss, and daily trade count in that order; finally
    /// rolls the daily counters over if the UTC calendar date has advanced.
    /// The ratchet and the rollover are the only mutations.
    pub fn can_open_position(&mut self, prices: &PriceMap) -> bool {
        let equity = self.equity(prices);
        if equity > self.peak_capital {
            self.peak_capital = equity;
        }

        if self.peak_capital <= Decimal::ZERO {
            warn!(peak = %self.peak_capital, "peak capital not positive, blocking opens");
            return false;
        }

        let drawdown_pct = (self.peak_capital - equity) / self.peak_capital * Decimal::ONE_HUNDRED;
        if drawdown_pct >= self.max_drawdown_pct {
            warn!(
                drawdown_pct = %drawdown_pct,
                limit = %self.max_drawdown_pct,
                equity = %equity,
                peak = %self.peak_capital,
                "max drawdown reached, blocking opens"
            );
            return false;
        }

        if self.daily_realized_pnl < Decimal::ZERO && self.initial_capital > Decimal::ZERO {
            let daily_loss_pct =
                (self.daily_realized_pnl / self.initial_capital).abs() * Decimal::ONE_HUNDRED;
            if daily_loss_pct >= self.max_daily_loss_pct {
                warn!(
                    daily_loss_pct = %daily_loss_pct,
                    limit = %self.max_daily_loss_pct,
                    "max daily loss reached, blocking opens"
                );
                return false;
            }
        }

        if self.daily_trade_count >= self.max_daily_trades {
            warn!(
                daily_trades = self.daily_trade_count,
                limit = self.max_daily_trades,
                "max daily trades reached, blocking opens"
            );
            return false;
        }

        let now = Utc::now();
        if now.date_naive() > self.daily_period_start.date_naive() {
            self.daily_period_start = now;
            self.daily_trade_count = 0;
            self.daily_realized_pnl = Decimal::ZERO;
            info!(date = %now.date_naive(), "daily counters reset");
        }

        true
    }

    /// Opens a position, debiting `entry_cost + entry_fee` from capital.
    ///
    /// Returns `Ok(false)` on gate rejection, duplicate symbol, or
    /// insufficient capital; the ledger is left unchanged in those cases.
    ///
    /// # Errors
    /// `RiskError` if the request carries a non-positive price or size.
    pub fn open_position(&mut self, request: OpenRequest) -> Result<bool, RiskError> {
        if request.entry_price <= Decimal::ZERO {
            return Err(RiskError::NonPositivePrice {
                symbol: request.symbol,
                price: request.entry_price,
            });
        }
        if request.size <= Decimal::ZERO {
            return Err(RiskError::NonPositiveSize {
                symbol: request.symbol,
                size: request.size,
            });
        }

        if !self.can_open_position(&PriceMap::new()) {
            return Ok(false);
        }

        if self.open_positions.contains_key(&request.symbol) {
            warn!(symbol = %request.symbol, "position already open, rejecting duplicate");
            return Ok(false);
        }

        let entry_cost = request.entry_price * request.size;
        let entry_fee = entry_cost * self.fee_rate;
        let total_entry_cost = entry_cost + entry_fee;

        if self.current_capital < total_entry_cost {
            warn!(
                symbol = %request.symbol,
                capital = %self.current_capital,
                required = %total_entry_cost,
                "insufficient capital to open position"
            );
            return Ok(false);
        }

        self.current_capital -= total_entry_cost;
        self.daily_trade_count += 1;

        let position = Position {
            symbol: request.symbol.clone(),
            direction: request.direction,
            size: request.size,
            entry_price: request.entry_price,
            stop_loss_price: request.stop_loss_price,
            take_profit_price: request.take_profit_price,
            entry_cost,
            entry_fee,
            opened_at: Utc::now(),
            reason: request.reason,
        };

        info!(
            symbol = %position.symbol,
            direction = %position.direction,
            size = %position.size,
            entry_price = %position.entry_price,
            entry_cost = %entry_cost,
            entry_fee = %entry_fee,
            remaining_capital = %self.current_capital,
            "position opened"
        );
        self.open_positions.insert(request.symbol, position);

        Ok(true)
    }

    /// Closes an open position at `exit_price`, crediting
    /// `exit_price * size - exit_fee` back to capital.
    ///
    /// `net_pnl` on the returned trade equals the capital delta over the
    /// position's lifetime: `(exit_price * size - exit_fee) - entry_cost -
    /// entry_fee`. Returns `Ok(None)` when no position is open for the
    /// symbol.
    ///
    /// # Errors
    /// `RiskError::NonPositivePrice` if `exit_price <= 0`.
    pub fn close_position(
        &mut self,
        symbol: &str,
        exit_price: Decimal,
        close_reason: CloseReason,
    ) -> Result<Option<ClosedTrade>, RiskError> {
        if exit_price <= Decimal::ZERO {
            return Err(RiskError::NonPositivePrice {
                symbol: symbol.to_string(),
                price: exit_price,
            });
        }

        let Some(position) = self.open_positions.remove(symbol) else {
            warn!(symbol, "no open position to close");
            return Ok(None);
        };

        let gross_pnl = match position.direction {
            Direction::Long => (exit_price - position.entry_price) * position.size,
            Direction::Short => (position.entry_price - exit_price) * position.size,
        };
        let exit_proceeds = exit_price * position.size;
        let exit_fee = exit_proceeds * self.fee_rate;
        let net_pnl = exit_proceeds - position.entry_cost - position.entry_fee - exit_fee;

        self.current_capital += exit_proceeds - exit_fee;
        if self.current_capital > self.peak_capital {
            self.peak_capital = self.current_capital;
        }
        self.daily_realized_pnl += net_pnl;

        let closed_at = Utc::now();
        let trade = ClosedTrade {
            symbol: position.symbol,
            direction: position.direction,
            size: position.size,
            entry_price: position.entry_price,
            stop_loss_price: position.stop_loss_price,
            take_profit_price: position.take_profit_price,
            exit_price,
            entry_cost: position.entry_cost,
            entry_fee: position.entry_fee,
            exit_fee,
            gross_pnl,
            net_pnl,
            opened_at: position.opened_at,
            closed_at,
            duration_secs: (closed_at - position.opened_at).num_seconds(),
            reason: position.reason,
            close_reason,
        };

        info!(
            symbol = %trade.symbol,
            direction = %trade.direction,
            exit_price = %exit_price,
            net_pnl = %net_pnl,
            total_fees = %(trade.entry_fee + exit_fee),
            close_reason = %close_reason,
            capital = %self.current_capital,
            "position closed"
        );
        self.trade_history.push(trade.clone());

        Ok(Some(trade))
    }

    /// Pure read: reports whether `current_price` crosses the position's
    /// stop or take-profit level. Boundaries are inclusive on both sides
    /// and the stop is checked first.
    ///
    /// # Errors
    /// `RiskError::NonPositivePrice` if `current_price <= 0`.
    pub fn check_stop_loss_take_profit(
        &self,
        symbol: &str,
        current_price: Decimal,
    ) -> Result<Option<ExitTrigger>, RiskError> {
        if current_price <= Decimal::ZERO {
            return Err(RiskError::NonPositivePrice {
                symbol: symbol.to_string(),
                price: current_price,
            });
        }

        let Some(position) = self.open_positions.get(symbol) else {
            return Ok(None);
        };

        let trigger = match position.direction {
            Direction::Long => {
                if current_price <= position.stop_loss_price {
                    Some(ExitTrigger::StopLoss)
                } else if current_price >= position.take_profit_price {
                    Some(ExitTrigger::TakeProfit)
                } else {
                    None
                }
            }
            Direction::Short => {
                if current_price >= position.stop_loss_price {
                    Some(ExitTrigger::StopLoss)
                } else if current_price <= position.take_profit_price {
                    Some(ExitTrigger::TakeProfit)
                } else {
                    None
                }
            }
        };

        Ok(trigger)
    }

    #[must_use]
    pub const fn current_capital(&self) -> Decimal {
        self.current_capital
    }

    #[must_use]
    pub const fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    #[must_use]
    pub const fn peak_capital(&self) -> Decimal {
        self.peak_capital
    }

    /// Realized plus unrealized PnL since inception.
    #[must_use]
    pub fn total_pnl(&self, prices: &PriceMap) -> Decimal {
        self.equity(prices) - self.initial_capital
    }

    /// Current equity drawdown from the high-water mark, in percent.
    #[must_use]
    pub fn drawdown_pct(&self, prices: &PriceMap) -> Decimal {
        if self.peak_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_capital - self.equity(prices)) / self.peak_capital * Decimal::ONE_HUNDRED
    }

    #[must_use]
    pub const fn open_positions(&self) -> &HashMap<String, Position> {
        &self.open_positions
    }

    #[must_use]
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.get(symbol)
    }

    #[must_use]
    pub fn trade_history(&self) -> &[ClosedTrade] {
        &self.trade_history
    }

    #[must_use]
    pub const fn daily_trade_count(&self) -> u32 {
        self.daily_trade_count
    }

    #[must_use]
    pub const fn daily_realized_pnl(&self) -> Decimal {
        self.daily_realized_pnl
    }

    #[cfg(test)]
    fn set_daily_period_start(&mut self, start: DateTime<Utc>) {
        self.daily_period_start = start;
    }
}
