use crate::error::ExecutionError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::{EntryOrder, ExitOrder, Fill};
use paper_trade_core::traits::ExecutionHandler;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Simulated fill engine: applies uniform random slippage in
/// `[-slippage_pct, +slippage_pct]` multiplicatively and charges the
/// configured per-side fee. Stateless across calls apart from the RNG.
///
/// The fee on the returned `Fill` is informational; the risk ledger
/// derives its own fees from the same configured rate, so the two always
/// agree.
#[derive(Debug)]
pub struct PaperExecutionHandler {
    fee_rate: Decimal,
    slippage_pct: f64,
    rng: StdRng,
}

impl PaperExecutionHandler {
    /// Creates a handler seeded from system entropy.
    #[must_use]
    pub fn new(fee_rate: f64, slippage_pct: f64) -> Self {
        Self {
            fee_rate: Decimal::try_from(fee_rate).unwrap_or_default(),
            slippage_pct,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a handler with a fixed seed for reproducible fills.
    #[must_use]
    pub fn with_seed(fee_rate: f64, slippage_pct: f64, seed: u64) -> Self {
        Self {
            fee_rate: Decimal::try_from(fee_rate).unwrap_or_default(),
            slippage_pct,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match config.execution.random_seed {
            Some(seed) => Self::with_seed(
                config.trading.fee_rate,
                config.execution.slippage_pct,
                seed,
            ),
            None => Self::new(config.trading.fee_rate, config.execution.slippage_pct),
        }
    }

    fn apply_slippage(&mut self, desired_price: Decimal) -> (Decimal, f64) {
        let slippage = if self.slippage_pct > 0.0 {
            self.rng.gen_range(-self.slippage_pct..=self.slippage_pct)
        } else {
            0.0
        };
        let multiplier = Decimal::try_from(1.0 + slippage).unwrap_or(Decimal::ONE);
        (desired_price * multiplier, slippage)
    }
}

#[async_trait]
impl ExecutionHandler for PaperExecutionHandler {
    async fn fill_entry(&mut self, order: &EntryOrder) -> Result<Option<Fill>> {
        if order.size <= Decimal::ZERO {
            return Err(ExecutionError::NonPositiveSize {
                symbol: order.symbol.clone(),
                size: order.size,
            }
            .into());
        }

        let desired_price = if order.desired_price > Decimal::ZERO {
            order.desired_price
        } else {
            match order.fallback_price {
                Some(fallback) if fallback > Decimal::ZERO => {
                    warn!(
                        symbol = %order.symbol,
                        fallback = %fallback,
                        "desired entry price not positive, using fallback"
                    );
                    fallback
                }
                _ => {
                    warn!(symbol = %order.symbol, "no positive entry price available");
                    return Ok(None);
                }
            }
        };

        let (filled_price, slippage) = self.apply_slippage(desired_price);
        let fee = filled_price * order.size * self.fee_rate;
        let total_cost = filled_price * order.size + fee;

        info!(
            symbol = %order.symbol,
            direction = %order.direction,
            size = %order.size,
            filled_price = %filled_price,
            slippage_pct = slippage * 100.0,
            "entry filled (paper)"
        );

        Ok(Some(Fill {
            symbol: order.symbol.clone(),
            filled_price,
            fee,
            total_cost,
            slippage,
            timestamp: Utc::now(),
        }))
    }

    async fn fill_exit(&mut self, order: &ExitOrder) -> Result<Option<Fill>> {
        if order.size <= Decimal::ZERO {
            return Err(ExecutionError::NonPositiveSize {
                symbol: order.symbol.clone(),
                size: order.size,
            }
            .into());
        }

        if order.desired_price <= Decimal::ZERO {
            warn!(
                symbol = %order.symbol,
                desired = %order.desired_price,
                "exit price not positive, cannot fill"
            );
            return Ok(None);
        }

        let (filled_price, slippage) = self.apply_slippage(order.desired_price);
        let fee = filled_price * order.size * self.fee_rate;
        let total_cost = filled_price * order.size + fee;

        info!(
            symbol = %order.symbol,
            size = %order.size,
            filled_price = %filled_price,
            slippage_pct = slippage * 100.0,
            "exit filled (paper)"
        );

        Ok(Some(Fill {
            symbol: order.symbol.clone(),
            filled_price,
            fee,
            total_cost,
            slippage,
            timestamp: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_trade_core::position::Direction;
    use rust_decimal_macros::dec;

    fn entry(size: Decimal, desired: Decimal, fallback: Option<Decimal>) -> EntryOrder {
        EntryOrder {
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            size,
            desired_price: desired,
            fallback_price: fallback,
        }
    }

    fn exit(size: Decimal, desired: Decimal) -> ExitOrder {
        ExitOrder {
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            size,
            desired_price: desired,
        }
    }

    #[tokio::test]
    async fn fills_stay_within_slippage_bounds() {
        let mut handler = PaperExecutionHandler::with_seed(0.001, 0.001, 42);
        for _ in 0..200 {
            let fill = handler
                .fill_entry(&entry(dec!(0.1), dec!(100), None))
                .await
                .unwrap()
                .unwrap();
            assert!(fill.filled_price >= dec!(99.9), "price {}", fill.filled_price);
            assert!(fill.filled_price <= dec!(100.1), "price {}", fill.filled_price);
            assert!(fill.slippage.abs() <= 0.001);
        }
    }

    #[tokio::test]
    async fn seeded_handlers_produce_identical_fills() {
        let mut a = PaperExecutionHandler::with_seed(0.001, 0.001, 7);
        let mut b = PaperExecutionHandler::with_seed(0.001, 0.001, 7);
        for _ in 0..10 {
            let fa = a
                .fill_entry(&entry(dec!(1), dec!(250), None))
                .await
                .unwrap()
                .unwrap();
            let fb = b
                .fill_entry(&entry(dec!(1), dec!(250), None))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(fa.filled_price, fb.filled_price);
            assert!((fa.slippage - fb.slippage).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn zero_slippage_fills_at_desired_price() {
        let mut handler = PaperExecutionHandler::with_seed(0.001, 0.0, 1);
        let fill = handler
            .fill_entry(&entry(dec!(0.1), dec!(100), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fill.filled_price, dec!(100));
        assert_eq!(fill.fee, dec!(0.01));
        assert_eq!(fill.total_cost, dec!(10.01));
        assert!(fill.slippage.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fee_matches_filled_notional() {
        let mut handler = PaperExecutionHandler::with_seed(0.002, 0.001, 3);
        let fill = handler
            .fill_entry(&entry(dec!(2), dec!(50), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fill.fee, fill.filled_price * dec!(2) * dec!(0.002));
        assert_eq!(fill.total_cost, fill.filled_price * dec!(2) + fill.fee);
    }

    #[tokio::test]
    async fn entry_uses_fallback_when_desired_invalid() {
        let mut handler = PaperExecutionHandler::with_seed(0.001, 0.0, 1);
        let fill = handler
            .fill_entry(&entry(dec!(0.1), Decimal::ZERO, Some(dec!(80))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fill.filled_price, dec!(80));

        let none = handler
            .fill_entry(&entry(dec!(0.1), Decimal::ZERO, None))
            .await
            .unwrap();
        assert!(none.is_none());

        let none = handler
            .fill_entry(&entry(dec!(0.1), dec!(-5), Some(dec!(-1))))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn exit_rejects_non_positive_price() {
        let mut handler = PaperExecutionHandler::with_seed(0.001, 0.001, 1);
        let none = handler.fill_exit(&exit(dec!(0.1), Decimal::ZERO)).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn non_positive_size_is_an_error() {
        let mut handler = PaperExecutionHandler::with_seed(0.001, 0.001, 1);
        assert!(handler
            .fill_entry(&entry(Decimal::ZERO, dec!(100), None))
            .await
            .is_err());
        assert!(handler.fill_exit(&exit(dec!(-1), dec!(100))).await.is_err());
    }
}
