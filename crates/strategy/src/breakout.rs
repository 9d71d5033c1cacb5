use anyhow::Result;
use async_trait::async_trait;
use paper_trade_core::config::StrategyConfig;
use paper_trade_core::events::{IndicatorSnapshot, Signal, SignalAction};
use paper_trade_core::traits::Strategy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::screen::screen_signal;

/// Breakout strategy: band breaches on strong volume count double,
/// middle-band pushes with momentum count single, and a volatility
/// expansion confirms either side. The stop sits at the breached band.
pub struct BreakoutStrategy {
    enabled: bool,
    min_confidence: f64,
}

impl BreakoutStrategy {
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
impl Strategy for BreakoutStrategy {
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

        if price > snapshot.bb_upper * 1.001 && snapshot.volume_ratio > 1.3 {
            long_votes += 2;
        } else if price > snapshot.bb_middle * 1.005
            && snapshot.momentum > 1.01
            && snapshot.volume_ratio > 1.2
        {
            long_votes += 1;
        }

        if price < snapshot.bb_lower * 0.999 && snapshot.volume_ratio > 1.3 {
            short_votes += 2;
        } else if price < snapshot.bb_middle * 0.995
            && snapshot.momentum < 0.99
            && snapshot.volume_ratio > 1.2
        {
            short_votes += 1;
        }

        if snapshot.volatility > 0.02 {
            if long_votes > 0 {
                long_votes += 1;
            }
            if short_votes > 0 {
                short_votes += 1;
            }
        }

        let atr = snapshot.atr;
        let signal = if long_votes >= 2 {
            let confidence = f64::min(0.9, 0.6 + f64::from(long_votes) * 0.1);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Long,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(snapshot.bb_upper).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price + atr * 4.0).unwrap_or_default(),
                reason: format!(
                    "Breakout long: price={price:.2}, bb_upper={:.2}, volume_ratio={:.2}",
                    snapshot.bb_upper, snapshot.volume_ratio
                ),
            })
        } else if short_votes >= 2 {
            let confidence = f64::min(0.9, 0.6 + f64::from(short_votes) * 0.1);
            Some(Signal {
                symbol: symbol.to_string(),
                action: SignalAction::Short,
                confidence,
                entry_price: snapshot.current_price,
                stop_loss_price: Decimal::try_from(snapshot.bb_lower).unwrap_or_default(),
                take_profit_price: Decimal::try_from(price - atr * 4.0).unwrap_or_default(),
                reason: format!(
                    "Breakout short: price={price:.2}, bb_lower={:.2}, volume_ratio={:.2}",
                    snapshot.bb_lower, snapshot.volume_ratio
                ),
            })
        } else {
            None
        };

        Ok(signal.and_then(|s| screen_signal(self.enabled, self.min_confidence, s)))
    }

    fn name(&self) -> &str {
        "Breakout"
    }
}
