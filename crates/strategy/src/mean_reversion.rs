use anyhow::Result;
use async_trait::async_trait;
use paper_trade_core::config::StrategyConfig;
use paper_trade_core::events::{IndicatorSnapshot, Signal, SignalAction};
use paper_trade_core::traits::Strategy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::screen::screen_signal;

/// Mean reversion strategy: fades stretched prices using z-score, band
/// position and RSI extremes, targeting the middle band.
pub struct MeanReversionStrategy {
    enabled: bool,
    min_confidence: f64,
}

impl MeanReversionStrategy {
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
impl Strategy for MeanReversionStrategy {
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

        if snapshot.z_score < -1.5 {
            long_votes += 1;
        } else if snapshot.z_score > 1.5 {
            short_votes += 1;
        }

        if snapshot.bb_position < 0.2 {
            long_votes += 1;
        } else if snapshot.bb_position > 0.8 {
            short_votes += 1;
        }

        if snapshot.rsi_14 < 30.0 {
            long_votes += 1;
        } else if snapshot.rsi_14 > 70.0 {
            short_votes += 1;
        }

        let atr = snapshot.atr;
        let signal = if long_votes >= 2 {
            let confidence = f64::min(0.85, 0.55 + f64::from(long_votes) * 0.1);
            // Stop beyond both the ATR cushion and the lower band.
            let stop = f64::min(price - atr * 2.0, snapshot.bb_lower * 0.995);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Long,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(stop).unwrap_or_default(),
                take_profit_price: Decimal::try_from(snapshot.bb_middle).unwrap_or_default(),
                reason: format!(
                    "Mean reversion long: z_score={:.2}, bb_position={:.2}",
                    snapshot.z_score, snapshot.bb_position
                ),
            })
        } else if short_votes >= 2 {
            let confidence = f64::min(0.85, 0.55 + f64::from(short_votes) * 0.1);
            let stop = f64::max(price + atr * 2.0, snapshot.bb_upper * 1.005);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Short,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(stop).unwrap_or_default(),
                take_profit_price: Decimal::try_from(snapshot.bb_middle).unwrap_or_default(),
                reason: format!(
                    "Mean reversion short: z_score={:.2}, bb_position={:.2}",
                    snapshot.z_score, snapshot.bb_position
                ),
            })
        } else {
            None
        };

        Ok(signal.and_then(|s| screen_signal(self.enabled, self.min_confidence, s)))
    }

    fn name(&self) -> &str {
        "Mean Reversion"
    }
}
