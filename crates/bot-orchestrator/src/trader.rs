//! The trading actor: owns the risk state and drives the signal and
//! monitor loops against live or simulated execution.

use crate::commands::{TraderCommand, TraderStatus};
use crate::execution_wrapper::ExecutionWrapper;
use crate::handle::TraderHandle;
use anyhow::Result;
use paper_trade_core::config::{AppConfig, ExecutionMode};
use paper_trade_core::events::{EntryOrder, ExitOrder, PriceMap};
use paper_trade_core::position::{CloseReason, ClosedTrade};
use paper_trade_core::traits::{ExecutionHandler, MarketData, Strategy, TradeStore};
use paper_trade_risk::{OpenRequest, PositionSizer, RiskLedger};
use paper_trade_strategy::indicators::{snapshot_from_candles, MIN_CANDLES};
use paper_trade_strategy::{strategies_from_config, SignalValidator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 32;

/// Single owner of the trading loop. Build with [`Trader::new`], spawn
/// [`Trader::run`], and control the task through the returned
/// [`TraderHandle`].
///
/// A background task re-checks protective levels every monitor interval
/// while the actor itself evaluates strategies every signal interval and
/// answers commands in between. The two tasks share the ledger behind one
/// async mutex; the sizer's capital mirror is refreshed only after the
/// ledger confirms an open or a close.
pub struct Trader<M: MarketData> {
    mode: ExecutionMode,
    symbols: Vec<String>,
    candle_limit: usize,
    signal_interval: Duration,
    monitor_interval: Duration,
    ledger: Arc<Mutex<RiskLedger>>,
    sizer: Arc<parking_lot::Mutex<PositionSizer>>,
    executor: Arc<Mutex<ExecutionWrapper>>,
    market: Arc<M>,
    store: Arc<dyn TradeStore>,
    strategies: Vec<Box<dyn Strategy>>,
    validator: SignalValidator,
    last_prices: PriceMap,
    rx: mpsc::Receiver<TraderCommand>,
}

impl<M: MarketData + 'static> Trader<M> {
    /// Builds the actor and its control handle from configuration.
    #[must_use]
    pub fn new(
        config: &AppConfig,
        market: M,
        executor: ExecutionWrapper,
        store: Arc<dyn TradeStore>,
    ) -> (Self, TraderHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let trader = Self {
            mode: config.trading.mode,
            symbols: config.data.symbols.clone(),
            candle_limit: config.data.candle_limit,
            signal_interval: Duration::from_secs(config.trading.signal_interval_secs),
            monitor_interval: Duration::from_secs(config.trading.monitor_interval_secs),
            ledger: Arc::new(Mutex::new(RiskLedger::from_config(config))),
            sizer: Arc::new(parking_lot::Mutex::new(PositionSizer::from_config(config))),
            executor: Arc::new(Mutex::new(executor)),
            market: Arc::new(market),
            store,
            strategies: strategies_from_config(&config.strategies),
            validator: SignalValidator::from_config(&config.validation),
            last_prices: PriceMap::new(),
            rx,
        };
        (trader, TraderHandle::new(tx))
    }

    /// Runs until a `Stop` command arrives or every handle is dropped.
    /// On the way out, open positions are force-closed at the last known
    /// prices with reason `manual` and the monitor task is joined.
    ///
    /// # Errors
    /// Returns an error if the monitor task panics.
    pub async fn run(mut self) -> Result<()> {
        info!(mode = ?self.mode, symbols = ?self.symbols, "trader starting");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = tokio::spawn(monitor_positions(
            Arc::clone(&self.ledger),
            Arc::clone(&self.sizer),
            Arc::clone(&self.executor),
            Arc::clone(&self.market),
            Arc::clone(&self.store),
            self.monitor_interval,
            shutdown_rx,
        ));

        let mut signal_tick = tokio::time::interval(self.signal_interval);
        loop {
            tokio::select! {
                biased;
                cmd = self.rx.recv() => match cmd {
                    Some(TraderCommand::GetStatus(tx)) => {
                        let _ = tx.send(self.status().await);
                    }
                    Some(TraderCommand::Stop) => {
                        info!("stop command received");
                        break;
                    }
                    None => {
                        info!("all trader handles dropped, stopping");
                        break;
                    }
                },
                _ = signal_tick.tick() => {
                    self.signal_cycle().await;
                    self.log_status().await;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        self.close_all_positions().await;
        monitor.await?;
        info!("trader stopped");
        Ok(())
    }

    /// One pass over the configured symbols.
    async fn signal_cycle(&mut self) {
        let symbols = self.symbols.clone();
        for symbol in &symbols {
            if let Err(e) = self.evaluate_symbol(symbol).await {
                error!(symbol, error = %e, "signal evaluation failed");
            }
        }
    }

    async fn evaluate_symbol(&mut self, symbol: &str) -> Result<()> {
        // Record the freshest quote even when a position blocks a new
        // entry; the shutdown close uses it.
        let live_price = self.market.latest_price(symbol).await?;
        if let Some(price) = live_price {
            if price > Decimal::ZERO {
                self.last_prices.insert(symbol.to_string(), price);
            }
        }

        if self.ledger.lock().await.position(symbol).is_some() {
            return Ok(());
        }

        let candles = self.market.recent_candles(symbol, self.candle_limit).await?;
        if candles.len() < MIN_CANDLES {
            warn!(
                symbol,
                candles = candles.len(),
                "not enough candle history for indicators"
            );
            return Ok(());
        }
        let snapshot = snapshot_from_candles(&candles);

        let current_price = match live_price {
            Some(price) if price > Decimal::ZERO => price,
            _ => candles.last().map_or(Decimal::ZERO, |c| c.close),
        };
        if current_price <= Decimal::ZERO {
            warn!(symbol, "no usable price for evaluation");
            return Ok(());
        }

        let mut signal = None;
        for strategy in &self.strategies {
            if let Some(candidate) = strategy.generate_signal(&snapshot, symbol).await? {
                info!(
                    symbol,
                    strategy = strategy.name(),
                    action = ?candidate.action,
                    confidence = candidate.confidence,
                    "strategy signal"
                );
                signal = Some(candidate);
                break;
            }
        }
        let Some(signal) = signal else { return Ok(()) };

        if !self.validator.approves(&signal, &snapshot) {
            return Ok(());
        }
        let Some(direction) = signal.action.direction() else {
            return Ok(());
        };

        if !self.ledger.lock().await.can_open_position(&self.last_prices) {
            warn!(symbol, "risk limits block a new position");
            return Ok(());
        }

        let sized = self.sizer.lock().size_position(&signal, current_price)?;
        let Some(size) = sized else { return Ok(()) };

        let order = EntryOrder {
            symbol: symbol.to_string(),
            direction,
            size,
            desired_price: signal.entry_price,
            fallback_price: Some(current_price),
        };
        let filled = self.executor.lock().await.fill_entry(&order).await?;
        let Some(fill) = filled else {
            warn!(symbol, "entry produced no fill");
            return Ok(());
        };

        // Protective levels default around the ordered price when the
        // strategy leaves them unset.
        let reference = if signal.entry_price > Decimal::ZERO {
            signal.entry_price
        } else {
            current_price
        };
        let stop_loss_price = if signal.stop_loss_price > Decimal::ZERO {
            signal.stop_loss_price
        } else {
            reference * dec!(0.995)
        };
        let take_profit_price = if signal.take_profit_price > Decimal::ZERO {
            signal.take_profit_price
        } else {
            reference * dec!(1.01)
        };

        let (opened, capital) = {
            let mut ledger = self.ledger.lock().await;
            let opened = ledger.open_position(OpenRequest {
                symbol: symbol.to_string(),
                direction,
                size,
                entry_price: fill.filled_price,
                stop_loss_price,
                take_profit_price,
                reason: signal.reason,
            })?;
            (opened, ledger.current_capital())
        };
        if opened {
            self.sizer.lock().update_capital(capital);
            info!(
                symbol,
                ?direction,
                %size,
                price = %fill.filled_price,
                "position opened"
            );
        }
        Ok(())
    }

    async fn close_all_positions(&mut self) {
        let symbols: Vec<String> = {
            let ledger = self.ledger.lock().await;
            ledger.open_positions().keys().cloned().collect()
        };
        for symbol in symbols {
            let Some(price) = self.last_prices.get(&symbol).copied() else {
                warn!(symbol, "no known price, position left open");
                continue;
            };
            if let Err(e) = close_position_at(
                &self.ledger,
                &self.sizer,
                &self.executor,
                self.store.as_ref(),
                &symbol,
                price,
                CloseReason::Manual,
            )
            .await
            {
                error!(symbol, error = %e, "failed to close position on shutdown");
            }
        }
    }

    async fn status(&self) -> TraderStatus {
        let ledger = self.ledger.lock().await;
        let mut open_symbols: Vec<String> = ledger.open_positions().keys().cloned().collect();
        open_symbols.sort();
        TraderStatus {
            mode: self.mode,
            capital: ledger.current_capital(),
            total_pnl: ledger.total_pnl(&self.last_prices),
            drawdown_pct: ledger.drawdown_pct(&self.last_prices),
            open_positions: open_symbols.len(),
            open_symbols,
            total_trades: ledger.trade_history().len(),
        }
    }

    async fn log_status(&self) {
        let status = self.status().await;
        info!(
            capital = %status.capital,
            total_pnl = %status.total_pnl,
            drawdown_pct = %status.drawdown_pct,
            open_positions = status.open_positions,
            total_trades = status.total_trades,
            "trader status"
        );
    }
}

/// Background task: re-checks protective levels for every open position
/// on a fixed interval until the shutdown signal flips.
async fn monitor_positions<M: MarketData>(
    ledger: Arc<Mutex<RiskLedger>>,
    sizer: Arc<parking_lot::Mutex<PositionSizer>>,
    executor: Arc<Mutex<ExecutionWrapper>>,
    market: Arc<M>,
    store: Arc<dyn TradeStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(e) =
                    check_open_positions(&ledger, &sizer, &executor, market.as_ref(), store.as_ref())
                        .await
                {
                    error!(error = %e, "position monitor cycle failed");
                }
            }
        }
    }
    debug!("position monitor stopped");
}

async fn check_open_positions<M: MarketData>(
    ledger: &Mutex<RiskLedger>,
    sizer: &parking_lot::Mutex<PositionSizer>,
    executor: &Mutex<ExecutionWrapper>,
    market: &M,
    store: &dyn TradeStore,
) -> Result<()> {
    let symbols: Vec<String> = {
        let ledger = ledger.lock().await;
        ledger.open_positions().keys().cloned().collect()
    };
    for symbol in symbols {
        let Some(price) = market.latest_price(&symbol).await? else {
            continue;
        };
        if price <= Decimal::ZERO {
            continue;
        }
        let trigger = ledger
            .lock()
            .await
            .check_stop_loss_take_profit(&symbol, price)?;
        let Some(trigger) = trigger else { continue };
        debug!(symbol, %price, ?trigger, "protective level hit");
        close_position_at(ledger, sizer, executor, store, &symbol, price, trigger.into()).await?;
    }
    Ok(())
}

/// Closes `symbol` at `price`, persists the trade, and refreshes the
/// sizer's capital mirror. `Ok(None)` when the position is already gone
/// or the exit could not be priced.
async fn close_position_at(
    ledger: &Mutex<RiskLedger>,
    sizer: &parking_lot::Mutex<PositionSizer>,
    executor: &Mutex<ExecutionWrapper>,
    store: &dyn TradeStore,
    symbol: &str,
    price: Decimal,
    reason: CloseReason,
) -> Result<Option<ClosedTrade>> {
    let (direction, size) = {
        let ledger = ledger.lock().await;
        match ledger.position(symbol) {
            Some(position) => (position.direction, position.size),
            None => return Ok(None),
        }
    };
    let order = ExitOrder {
        symbol: symbol.to_string(),
        direction,
        size,
        desired_price: price,
    };
    let filled = executor.lock().await.fill_exit(&order).await?;
    let Some(fill) = filled else {
        warn!(symbol, "exit produced no fill, position stays open");
        return Ok(None);
    };
    let (trade, capital) = {
        let mut ledger = ledger.lock().await;
        let trade = ledger.close_position(symbol, fill.filled_price, reason)?;
        (trade, ledger.current_capital())
    };
    let Some(trade) = trade else { return Ok(None) };
    sizer.lock().update_capital(capital);
    if let Err(e) = store.add_trade(&trade) {
        error!(symbol, error = %e, "failed to persist closed trade");
    }
    info!(
        symbol,
        reason = %trade.close_reason,
        net_pnl = %trade.net_pnl,
        "position closed"
    );
    Ok(Some(trade))
}
