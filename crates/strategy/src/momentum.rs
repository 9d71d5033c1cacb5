use anyhow::Result;
use async_trait::async_trait;
use paper_trade_core::config::StrategyConfig;
use paper_trade_core::events::{IndicatorSnapshot, Signal, SignalAction};
use paper_trade_core::traits::Strategy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::screen::screen_signal;

/// Momentum strategy: counts directional votes from short/long RSI, the
/// MACD signal line plus histogram, and raw price momentum. Volume flow
/// scales confidence up or down rather than voting.
pub struct MomentumStrategy {
    enabled: bool,
    min_confidence: f64,
}

impl MomentumStrategy {
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
impl Strategy for MomentumStrategy {
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

        if snapshot.rsi_7 > 60.0 && snapshot.rsi_14 > 55.0 {
            long_votes += 1;
        } else if snapshot.rsi_7 < 40.0 && snapshot.rsi_14 < 45.0 {
            short_votes += 1;
        }

        if snapshot.macd_signal > 0.0 && snapshot.macd_histogram > 0.0 {
            long_votes += 1;
        } else if snapshot.macd_signal < 0.0 && snapshot.macd_histogram < 0.0 {
            short_votes += 1;
        }

        if snapshot.momentum > 1.02 {
            long_votes += 1;
        } else if snapshot.momentum < 0.98 {
            short_votes += 1;
        }

        let volume_boost = if snapshot.volume_ratio > 1.2 {
            1.2
        } else if snapshot.volume_ratio < 0.8 {
            0.8
        } else {
            1.0
        };

        let atr = snapshot.atr;
        let signal = if long_votes >= 2 {
            let confidence = f64::min(0.9, 0.5 + f64::from(long_votes) * 0.15 * volume_boost);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Long,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(price - atr * 2.0).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price + atr * 3.0).unwrap_or_default(),
                reason: format!(
                    "Momentum long: {long_votes} signals, volume_ratio={:.2}",
                    snapshot.volume_ratio
                ),
            })
        } else if short_votes >= 2 {
            let confidence = f64::min(0.9, 0.5 + f64::from(short_votes) * 0.15 * volume_boost);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Short,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(price + atr * 2.0).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price - atr * 3.0).unwrap_or_default(),
                reason: format!(
                    "Momentum short: {short_votes} signals, volume_ratio={:.2}",
                    snapshot.volume_ratio
                ),
            })
        } else {
            None
        };

        Ok(signal.and_then(|s| screen_signal(self.enabled, self.min_confidence, s)))
    }

    fn name(&self) -> &str {
        "Momentum"
    }
}
