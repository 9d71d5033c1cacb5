use anyhow::{bail, Result};
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::{Candle, EntryOrder, ExitOrder, PriceMap, Signal};
use paper_trade_core::position::{CloseReason, ClosedTrade};
use paper_trade_core::traits::{ExecutionHandler, Strategy};
use paper_trade_execution::PaperExecutionHandler;
use paper_trade_risk::{OpenRequest, PositionSizer, RiskLedger};
use paper_trade_strategy::indicators::{snapshot_from_candles, MIN_CANDLES};
use paper_trade_strategy::{strategies_from_config, SignalValidator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::report::{BacktestReport, EquityPoint};

/// Candles between signal evaluations. Stops and targets are still
/// checked on every candle.
const SIGNAL_CADENCE: usize = 6;

/// Replays historical candles through the same ledger, sizer, and
/// simulated executor the live session uses. One symbol per run; the
/// engine carries state across runs, so use a fresh engine per
/// experiment.
pub struct BacktestEngine {
    ledger: RiskLedger,
    sizer: PositionSizer,
    executor: PaperExecutionHandler,
    strategies: Vec<Box<dyn Strategy>>,
    validator: SignalValidator,
}

impl BacktestEngine {
    #[must_use]
    pub fn new(
        ledger: RiskLedger,
        sizer: PositionSizer,
        executor: PaperExecutionHandler,
        strategies: Vec<Box<dyn Strategy>>,
        validator: SignalValidator,
    ) -> Self {
        Self {
            ledger,
            sizer,
            executor,
            strategies,
            validator,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            RiskLedger::from_config(config),
            PositionSizer::from_config(config),
            PaperExecutionHandler::from_config(config),
            strategies_from_config(&config.strategies),
            SignalValidator::from_config(&config.validation),
        )
    }

    /// Replays `candles` (oldest first) for `symbol`. The first
    /// [`MIN_CANDLES`] candles only warm up the indicators; any position
    /// still open after the last candle is force-closed at its close.
    ///
    /// # Errors
    /// Fails when the history is shorter than [`MIN_CANDLES`] or a
    /// ledger or execution step reports an inconsistency.
    pub async fn run(&mut self, symbol: &str, candles: &[Candle]) -> Result<BacktestReport> {
        if candles.len() < MIN_CANDLES {
            bail!(
                "backtest needs at least {MIN_CANDLES} candles, got {}",
                candles.len()
            );
        }

        let initial_capital = self.ledger.initial_capital();
        info!(
            symbol,
            candles = candles.len(),
            %initial_capital,
            "starting backtest"
        );

        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len() - MIN_CANDLES);

        for i in MIN_CANDLES..candles.len() {
            let window = &candles[..=i];
            let candle = &candles[i];
            let price = candle.close;

            if self.ledger.position(symbol).is_some() {
                if let Some(trigger) = self.ledger.check_stop_loss_take_profit(symbol, price)? {
                    self.close_at(symbol, price, trigger.into(), &mut trades)
                        .await?;
                }
            }
            if self.ledger.position(symbol).is_some() {
                // Still open: record equity and wait for an exit.
                equity_curve.push(self.equity_point(candle));
                continue;
            }

            if i % SIGNAL_CADENCE == 0 {
                self.try_enter(symbol, window, price).await?;
            }

            equity_curve.push(self.equity_point(candle));
        }

        if self.ledger.position(symbol).is_some() {
            if let Some(last) = candles.last() {
                self.close_at(symbol, last.close, CloseReason::BacktestEnd, &mut trades)
                    .await?;
            }
        }

        let report = BacktestReport::build(
            symbol,
            trades,
            equity_curve,
            initial_capital,
            self.ledger.current_capital(),
        );
        info!(
            symbol,
            trades = report.total_trades,
            win_rate = report.win_rate,
            total_return = report.total_return,
            max_drawdown = report.max_drawdown,
            "backtest finished"
        );
        Ok(report)
    }

    /// One signal evaluation: poll strategies in priority order, screen
    /// the winner, size it, and open on a simulated fill.
    async fn try_enter(&mut self, symbol: &str, window: &[Candle], price: Decimal) -> Result<()> {
        let snapshot = snapshot_from_candles(window);

        let mut chosen: Option<Signal> = None;
        for strategy in &self.strategies {
            if let Some(signal) = strategy.generate_signal(&snapshot, symbol).await? {
                debug!(symbol, strategy = strategy.name(), "signal candidate");
                chosen = Some(signal);
                break;
            }
        }
        let Some(signal) = chosen else {
            return Ok(());
        };

        if !self.validator.approves(&signal, &snapshot) {
            return Ok(());
        }
        let Some(direction) = signal.action.direction() else {
            return Ok(());
        };
        if !self.ledger.can_open_position(&PriceMap::new()) {
            return Ok(());
        }
        let Some(size) = self.sizer.size_position(&signal, price)? else {
            return Ok(());
        };

        let order = EntryOrder {
            symbol: symbol.to_string(),
            direction,
            size,
            desired_price: signal.entry_price,
            fallback_price: Some(price),
        };
        let Some(fill) = self.executor.fill_entry(&order).await? else {
            return Ok(());
        };

        let stop_loss_price = if signal.stop_loss_price > Decimal::ZERO {
            signal.stop_loss_price
        } else {
            price * dec!(0.995)
        };
        let take_profit_price = if signal.take_profit_price > Decimal::ZERO {
            signal.take_profit_price
        } else {
            price * dec!(1.01)
        };

        let opened = self.ledger.open_position(OpenRequest {
            symbol: symbol.to_string(),
            direction,
            size,
            entry_price: fill.filled_price,
            stop_loss_price,
            take_profit_price,
            reason: signal.reason,
        })?;
        if opened {
            self.sizer.update_capital(self.ledger.current_capital());
        }
        Ok(())
    }

    /// Fills an exit at `price` and books the close. A fill the
    /// simulator refuses leaves the position open for the next candle.
    async fn close_at(
        &mut self,
        symbol: &str,
        price: Decimal,
        reason: CloseReason,
        trades: &mut Vec<ClosedTrade>,
    ) -> Result<()> {
        let (direction, size) = match self.ledger.position(symbol) {
            Some(position) => (position.direction, position.size),
            None => return Ok(()),
        };

        let order = ExitOrder {
            symbol: symbol.to_string(),
            direction,
            size,
            desired_price: price,
        };
        let Some(fill) = self.executor.fill_exit(&order).await? else {
            warn!(symbol, %price, "exit produced no fill, position stays open");
            return Ok(());
        };

        if let Some(trade) = self
            .ledger
            .close_position(symbol, fill.filled_price, reason)?
        {
            trades.push(trade);
            self.sizer.update_capital(self.ledger.current_capital());
        }
        Ok(())
    }

    fn equity_point(&self, candle: &Candle) -> EquityPoint {
        EquityPoint {
            timestamp: candle.timestamp,
            equity: self.ledger.current_capital(),
            price: candle.close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use paper_trade_core::events::{IndicatorSnapshot, SignalAction};
    use paper_trade_core::position::Direction;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits the same signal on every poll; `Flat` polls count but
    /// produce nothing.
    struct FixedStrategy {
        action: SignalAction,
        stop: Decimal,
        target: Decimal,
        polls: Arc<AtomicUsize>,
    }

    impl FixedStrategy {
        fn new(action: SignalAction, stop: Decimal, target: Decimal) -> (Self, Arc<AtomicUsize>) {
            let polls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    action,
                    stop,
                    target,
                    polls: Arc::clone(&polls),
                },
                polls,
            )
        }
    }

    #[async_trait]
    impl Strategy for FixedStrategy {
        async fn generate_signal(
            &self,
            snapshot: &IndicatorSnapshot,
            symbol: &str,
        ) -> Result<Option<Signal>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.action == SignalAction::Flat {
                return Ok(None);
            }
            Ok(Some(Signal {
                symbol: symbol.to_string(),
                action: self.action,
                confidence: 0.8,
                entry_price: snapshot.current_price,
                stop_loss_price: self.stop,
                take_profit_price: self.target,
                reason: "fixed".to_string(),
            }))
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    fn engine(strategy: FixedStrategy) -> BacktestEngine {
        engine_with_validator(strategy, SignalValidator::new(0.5, 0.05))
    }

    fn engine_with_validator(strategy: FixedStrategy, validator: SignalValidator) -> BacktestEngine {
        BacktestEngine::new(
            RiskLedger::new(dec!(1000), 50.0, 20.0, 100).with_fee_rate(0.001),
            PositionSizer::new(dec!(1000), 5.0),
            // Zero slippage so fills land exactly on the candle close.
            PaperExecutionHandler::with_seed(0.001, 0.0, 7),
            vec![Box::new(strategy)],
            validator,
        )
    }

    fn candle(step: usize, price: Decimal) -> Candle {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Candle {
            symbol: "BTCUSDT".to_string(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: dec!(500),
            timestamp: base + Duration::minutes(5 * step as i64),
        }
    }

    fn flat_series(len: usize, price: Decimal) -> Vec<Candle> {
        (0..len).map(|i| candle(i, price)).collect()
    }

    // ==================== Guard Tests ====================

    #[tokio::test]
    async fn refuses_short_histories() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Flat, Decimal::ZERO, Decimal::ZERO);
        let mut engine = engine(strategy);
        let candles = flat_series(MIN_CANDLES - 1, dec!(100));
        let err = engine.run("BTCUSDT", &candles).await.unwrap_err();
        assert!(err.to_string().contains("at least"));
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn take_profit_exit_books_the_expected_pnl() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Long, dec!(95), dec!(105));
        let mut engine = engine(strategy);

        // Entry fires at the first evaluation; the next candle crosses
        // the 105 target.
        let mut candles = flat_series(31, dec!(100));
        candles.push(candle(31, dec!(106)));

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.winning_trades, 1);
        assert!((report.win_rate - 100.0).abs() < 1e-9);

        // Size 0.5 at 100: entry cost 50 + 0.05 fee; exit at 106 nets
        // 53 - 50 - 0.05 - 0.053.
        let trade = &report.trades[0];
        assert_eq!(trade.close_reason, CloseReason::TakeProfit);
        assert_eq!(trade.size, dec!(0.5));
        assert_eq!(trade.entry_price, dec!(100));
        assert_eq!(trade.exit_price, dec!(106));
        assert_eq!(trade.net_pnl, dec!(2.897));
        assert_eq!(report.final_capital, dec!(1002.897));

        // The curve shows the entry debit while the position is open.
        assert_eq!(report.equity_curve.len(), 2);
        assert_eq!(report.equity_curve[0].equity, dec!(949.95));
        assert_eq!(report.equity_curve[1].equity, dec!(1002.897));
    }

    #[tokio::test]
    async fn stop_loss_exit_books_the_loss() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Long, dec!(95), dec!(200));
        let mut engine = engine(strategy);

        let mut candles = flat_series(31, dec!(100));
        candles.push(candle(31, dec!(94)));

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert!(report.win_rate.abs() < 1e-9);

        let trade = &report.trades[0];
        assert_eq!(trade.close_reason, CloseReason::StopLoss);
        assert_eq!(trade.exit_price, dec!(94));
        assert_eq!(trade.net_pnl, dec!(-3.097));
    }

    #[tokio::test]
    async fn open_position_is_force_closed_at_the_last_candle() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Long, dec!(95), dec!(200));
        let mut engine = engine(strategy);

        // Neither level is ever hit.
        let candles = flat_series(35, dec!(100));

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 1);

        let trade = &report.trades[0];
        assert_eq!(trade.close_reason, CloseReason::BacktestEnd);
        // Entry and exit both at 100: the round trip costs the two fees.
        assert_eq!(trade.net_pnl, dec!(-0.10));
        assert_eq!(report.final_capital, dec!(999.90));

        // The forced close happens after the last candle, so the curve
        // still shows the open position's debit.
        assert_eq!(report.equity_curve.len(), 5);
        assert_eq!(report.equity_curve[4].equity, dec!(949.95));
    }

    #[tokio::test]
    async fn short_exits_classify_against_mirrored_levels() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Short, dec!(105), dec!(95));
        let mut engine = engine(strategy);

        let mut candles = flat_series(31, dec!(100));
        candles.push(candle(31, dec!(94.5)));

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 1);

        let trade = &report.trades[0];
        assert_eq!(trade.direction, Direction::Short);
        assert_eq!(trade.close_reason, CloseReason::TakeProfit);
        assert_eq!(trade.gross_pnl, dec!(2.75));
        // Net tracks the cash delta, so the short's edge shows up in
        // gross only.
        assert_eq!(trade.net_pnl, dec!(-2.84725));
    }

    #[tokio::test]
    async fn reenters_after_a_close_on_the_next_evaluation() {
        let (strategy, polls) = FixedStrategy::new(SignalAction::Long, dec!(95), dec!(105));
        let mut engine = engine(strategy);

        // Open at 30, take profit at 31, reopen at 36, ride to the end.
        let mut candles = flat_series(31, dec!(100));
        candles.push(candle(31, dec!(106)));
        for step in 32..42 {
            candles.push(candle(step, dec!(100)));
        }

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 2);
        assert_eq!(report.trades[0].close_reason, CloseReason::TakeProfit);
        assert_eq!(report.trades[1].close_reason, CloseReason::BacktestEnd);
        // Evaluations at candles 30 and 36 only; 42 is out of range.
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn quiet_strategy_yields_a_flat_curve_and_zero_metrics() {
        let (strategy, polls) = FixedStrategy::new(SignalAction::Flat, Decimal::ZERO, Decimal::ZERO);
        let mut engine = engine(strategy);

        let candles = flat_series(40, dec!(100));
        let report = engine.run("BTCUSDT", &candles).await.unwrap();

        assert_eq!(report.total_trades, 0);
        assert!(report.win_rate.abs() < 1e-9);
        assert!(report.max_drawdown.abs() < 1e-9);
        assert_eq!(report.final_capital, dec!(1000));
        assert_eq!(report.equity_curve.len(), 10);
        assert!(report
            .equity_curve
            .iter()
            .all(|p| p.equity == dec!(1000)));
        // Candles 30 and 36 are the only evaluation points.
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_target_defaults_above_the_entry() {
        let (strategy, _) = FixedStrategy::new(SignalAction::Long, dec!(95), Decimal::ZERO);
        // The screen would reject a target-less signal, so disable it to
        // reach the defaulting path.
        let validator = SignalValidator::from_config(&paper_trade_core::config::ValidationConfig {
            enabled: false,
            fail_open: true,
            min_risk_reward: 0.5,
            max_volatility: 0.05,
        });
        let mut engine = engine_with_validator(strategy, validator);

        // Default target is entry * 1.01 = 101; candle 31 crosses it.
        let mut candles = flat_series(31, dec!(100));
        candles.push(candle(31, dec!(101.5)));

        let report = engine.run("BTCUSDT", &candles).await.unwrap();
        assert_eq!(report.total_trades, 1);
        let trade = &report.trades[0];
        assert_eq!(trade.take_profit_price, dec!(101));
        assert_eq!(trade.stop_loss_price, dec!(95));
        assert_eq!(trade.close_reason, CloseReason::TakeProfit);
    }
}
