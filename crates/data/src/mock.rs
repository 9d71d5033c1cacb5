//! Synthetic market data for paper trading without network access.
//!
//! Prices follow a bounded random walk per symbol: each observation
//! drifts the previous price by up to ±0.1% and is clamped to ±20% of
//! the symbol's base price. Candles are synthesized around the walk
//! with small OHLC jitter. Every call advances the walk, so repeated
//! queries see a moving market.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::Candle;
use paper_trade_core::traits::MarketData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const DEFAULT_CANDLE_INTERVAL_MIN: u32 = 5;

fn base_price(symbol: &str) -> Decimal {
    match symbol {
        "BTCUSDT" => dec!(45000),
        "ETHUSDT" => dec!(2500),
        "BNBUSDT" => dec!(300),
        "SOLUSDT" => dec!(100),
        "XRPUSDT" => dec!(0.5),
        "ADAUSDT" => dec!(0.4),
        "DOGEUSDT" => dec!(0.08),
        "AVAXUSDT" => dec!(35),
        "LINKUSDT" => dec!(15),
        "MATICUSDT" => dec!(0.8),
        _ => dec!(100),
    }
}

struct MockState {
    prices: HashMap<String, Decimal>,
    rng: StdRng,
}

/// Random-walk market data provider.
pub struct MockMarketData {
    candle_interval_min: u32,
    state: Mutex<MockState>,
}

impl MockMarketData {
    /// Creates a provider seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::build(StdRng::from_entropy(), DEFAULT_CANDLE_INTERVAL_MIN)
    }

    /// Creates a provider with a fixed seed for reproducible walks.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::build(StdRng::seed_from_u64(seed), DEFAULT_CANDLE_INTERVAL_MIN)
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let rng = match config.execution.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::build(rng, config.data.candle_interval_min)
    }

    fn build(rng: StdRng, candle_interval_min: u32) -> Self {
        Self {
            candle_interval_min,
            state: Mutex::new(MockState {
                prices: HashMap::new(),
                rng,
            }),
        }
    }

    /// Advances the walk for `symbol` by one step and returns the new
    /// price, clamped to ±20% of the symbol's base.
    fn step_price(state: &mut MockState, symbol: &str) -> Decimal {
        let base = base_price(symbol);
        let current = state.prices.get(symbol).copied().unwrap_or(base);

        let drift: f64 = state.rng.gen_range(-0.001..=0.001);
        let multiplier = Decimal::try_from(1.0 + drift).unwrap_or(Decimal::ONE);
        let stepped = (current * multiplier).clamp(base * dec!(0.8), base * dec!(1.2));

        state.prices.insert(symbol.to_string(), stepped);
        stepped
    }

    fn jitter(rng: &mut StdRng, lo: f64, hi: f64) -> Decimal {
        Decimal::try_from(rng.gen_range(lo..=hi)).unwrap_or(Decimal::ONE)
    }

    fn synth_candle(state: &mut MockState, symbol: &str, timestamp: DateTime<Utc>) -> Candle {
        let price = Self::step_price(state, symbol);
        let high = price * Self::jitter(&mut state.rng, 1.0, 1.005);
        let low = price * Self::jitter(&mut state.rng, 0.995, 1.0);
        let close = price * Self::jitter(&mut state.rng, 0.998, 1.002);
        let volume =
            Decimal::try_from(state.rng.gen_range(100.0..=1000.0)).unwrap_or_default();

        Candle {
            symbol: symbol.to_string(),
            open: price,
            high,
            low,
            close,
            volume,
            timestamp,
        }
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let mut state = self.state.lock();
        Ok(Some(Self::step_price(&mut state, symbol)))
    }

    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let step_min = i64::from(self.candle_interval_min);

        let mut candles = Vec::with_capacity(limit);
        for i in 0..limit {
            let back = (limit - 1 - i) as i64;
            let timestamp = now - Duration::minutes(step_min * back);
            candles.push(Self::synth_candle(&mut state, symbol, timestamp));
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Price Walk Tests ====================

    #[tokio::test]
    async fn seeded_walks_are_reproducible() {
        let a = MockMarketData::with_seed(7);
        let b = MockMarketData::with_seed(7);

        for _ in 0..5 {
            let pa = a.latest_price("BTCUSDT").await.unwrap();
            let pb = b.latest_price("BTCUSDT").await.unwrap();
            assert_eq!(pa, pb);
        }
    }

    #[tokio::test]
    async fn walk_stays_inside_band() {
        let data = MockMarketData::with_seed(1);
        for _ in 0..1000 {
            let price = data.latest_price("XRPUSDT").await.unwrap().unwrap();
            assert!(price >= dec!(0.4), "below band: {price}");
            assert!(price <= dec!(0.6), "above band: {price}");
        }
    }

    #[tokio::test]
    async fn known_symbol_starts_near_its_base() {
        let data = MockMarketData::with_seed(2);
        let price = data.latest_price("BTCUSDT").await.unwrap().unwrap();
        assert!(price >= dec!(36000));
        assert!(price <= dec!(54000));
    }

    #[tokio::test]
    async fn unknown_symbol_walks_from_default_base() {
        let data = MockMarketData::with_seed(3);
        let price = data.latest_price("FOOUSDT").await.unwrap().unwrap();
        assert!(price >= dec!(80));
        assert!(price <= dec!(120));
    }

    // ==================== Candle Tests ====================

    #[tokio::test]
    async fn candles_are_oldest_first_with_fixed_spacing() {
        let data = MockMarketData::with_seed(4);
        let candles = data.recent_candles("BTCUSDT", 50).await.unwrap();

        assert_eq!(candles.len(), 50);
        for pair in candles.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            assert_eq!(gap, Duration::minutes(5));
        }
    }

    #[tokio::test]
    async fn candle_fields_respect_jitter_bounds() {
        let data = MockMarketData::with_seed(5);
        let candles = data.recent_candles("ETHUSDT", 100).await.unwrap();

        for candle in &candles {
            assert_eq!(candle.symbol, "ETHUSDT");
            assert!(candle.high >= candle.open);
            assert!(candle.high <= candle.open * dec!(1.0051));
            assert!(candle.low <= candle.open);
            assert!(candle.low >= candle.open * dec!(0.9949));
            assert!(candle.close >= candle.open * dec!(0.9979));
            assert!(candle.close <= candle.open * dec!(1.0021));
            assert!(candle.volume >= dec!(99.999));
            assert!(candle.volume <= dec!(1000.001));
        }
    }

    #[tokio::test]
    async fn zero_limit_yields_no_candles() {
        let data = MockMarketData::with_seed(6);
        let candles = data.recent_candles("BTCUSDT", 0).await.unwrap();
        assert!(candles.is_empty());
    }
}
