use anyhow::Result;
use async_trait::async_trait;
use paper_trade_core::config::StrategyConfig;
use paper_trade_core::events::{IndicatorSnapshot, Signal, SignalAction};
use paper_trade_core::traits::Strategy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::screen::screen_signal;

/// Trend following strategy: a MACD crossover with matching histogram
/// counts double, price displacement from the middle band and momentum
/// count single, and a non-extreme RSI confirms either side. Needs
/// three votes, one more than the other strategies.
pub struct TrendFollowingStrategy {
    enabled: bool,
    min_confidence: f64,
}

impl TrendFollowingStrategy {
    #[must_use]
    pub const fn new(min_confidence: f64) -> Self {
        Self {
            enabled: true,
            min_confidence,
        }
    }

    #[must_use]
    pub const fn from_config(config: &StrategyConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_confidence: config.min_confidence,
        }
    }
}

#[async_trait]
impl Strategy for TrendFollowingStrategy {
    async fn generate_signal(
        &self,
        snapshot: &IndicatorSnapshot,
        symbol: &str,
    ) -> Result<Option<Signal>> {
        let price = snapshot.current_price.to_f64().unwrap_or(0.0);
        if price <= 0.0 {
            return Ok(None);
        }

        let mut long_votes = 0u32;
        let mut short_votes = 0u32;

        if snapshot.macd > snapshot.macd_signal && snapshot.macd_histogram > 0.0 {
            long_votes += 2;
        } else if snapshot.macd < snapshot.macd_signal && snapshot.macd_histogram < 0.0 {
            short_votes += 2;
        }

        if price > snapshot.bb_middle * 1.002 {
            long_votes += 1;
        } else if price < snapshot.bb_middle * 0.998 {
            short_votes += 1;
        }

        if snapshot.momentum > 1.01 {
            long_votes += 1;
        } else if snapshot.momentum < 0.99 {
            short_votes += 1;
        }

        if snapshot.rsi_14 > 40.0 && snapshot.rsi_14 < 70.0 {
            if long_votes > 0 {
                long_votes += 1;
            }
            if short_votes > 0 {
                short_votes += 1;
            }
        }

        let atr = snapshot.atr;
        let signal = if long_votes >= 3 {
            let confidence = f64::min(0.9, 0.65 + f64::from(long_votes) * 0.08);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Long,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(price - atr * 2.5).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price + atr * 5.0).unwrap_or_default(),
                reason: format!(
                    "Trend following long: momentum={:.4}, macd={:.4}",
                    snapshot.momentum, snapshot.macd
                ),
            })
        } else if short_votes >= 3 {
            let confidence = f64::min(0.9, 0.65 + f64::from(short_votes) * 0.08);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Short,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(price + atr * 2.5).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price - atr * 5.0).unwrap_or_default(),
                reason: format!(
                    "Trend following short: momentum={:.4}, macd={:.4}",
                    snapshot.momentum, snapshot.macd
                ),
            })
        } else {
            None
        };

        Ok(signal.and_then(|s| screen_signal(self.enabled, self.min_confidence, s)))
    }

    fn name(&self) -> &str {
        "Trend Following"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn aligned_trend_longs_with_wide_target() {
        let mut s = IndicatorSnapshot::neutral(dec!(100));
        s.atr = 2.0;
        s.macd = 0.5;
        s.macd_signal = 0.3;
        s.macd_histogram = 0.2;
        s.bb_middle = 99.0;
        s.momentum = 1.02;
        s.rsi_14 = 55.0;

        let signal = TrendFollowingStrategy::new(0.75)
            .generate_signal(&s, "BTCUSDT")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, SignalAction::Long);
        // Five votes cap the confidence at 0.9.
        assert!((signal.confidence - 0.9).abs() < 1e-12);
        assert_eq!(signal.stop_loss_price, dec!(95));
        assert_eq!(signal.take_profit_price, dec!(110));
        assert!(signal.reason.contains("momentum=1.0200"));
    }

    #[tokio::test]
    async fn exactly_three_votes_clears_the_bar() {
        let mut s = IndicatorSnapshot::neutral(dec!(100));
        s.atr = 2.0;
        s.macd = 0.5;
        s.macd_signal = 0.3;
        s.macd_histogram = 0.2;
        s.rsi_14 = 55.0;

        let signal = TrendFollowingStrategy::new(0.75)
            .generate_signal(&s, "BTCUSDT")
            .await
            .unwrap()
            .unwrap();
        assert!((signal.confidence - 0.89).abs() < 1e-12);
    }

    #[tokio::test]
    async fn downtrend_shorts_with_mirrored_levels() {
        let mut s = IndicatorSnapshot::neutral(dec!(100));
        s.atr = 2.0;
        s.macd = -0.5;
        s.macd_signal = -0.3;
        s.macd_histogram = -0.2;
        s.bb_middle = 102.0;
        s.momentum = 0.98;
        s.rsi_14 = 35.0;

        let signal = TrendFollowingStrategy::new(0.75)
            .generate_signal(&s, "ETHUSDT")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, SignalAction::Short);
        assert!((signal.confidence - 0.9).abs() < 1e-12);
        assert_eq!(signal.stop_loss_price, dec!(105));
        assert_eq!(signal.take_profit_price, dec!(90));
    }

    #[tokio::test]
    async fn macd_crossover_alone_is_not_enough() {
        let mut s = IndicatorSnapshot::neutral(dec!(100));
        s.atr = 2.0;
        s.macd = 0.5;
        s.macd_signal = 0.3;
        s.macd_histogram = 0.2;
        s.rsi_14 = 75.0;

        let signal = TrendFollowingStrategy::new(0.75)
            .generate_signal(&s, "BTCUSDT")
            .await
            .unwrap();
        assert!(signal.is_none());
    }

    #[tokio::test]
    async fn extreme_rsi_withholds_the_confirmation_vote() {
        let mut s = IndicatorSnapshot::neutral(dec!(100));
        s.atr = 2.0;
        s.macd = 0.5;
        s.macd_signal = 0.3;
        s.macd_histogram = 0.2;
        s.momentum = 1.02;
        s.rsi_14 = 75.0;

        let signal = TrendFollowingStrategy::new(0.75)
            .generate_signal(&s, "BTCUSDT")
            .await
            .unwrap()
            .unwrap();
        // Three votes without the RSI boost.
        assert!((signal.confidence - 0.89).abs() < 1e-12);
    }
}
