//! Live market data backed by Bybit's public endpoints.

use crate::client::BybitClient;
use anyhow::Result;
use async_trait::async_trait;
use paper_trade_core::events::Candle;
use paper_trade_core::traits::MarketData;
use rust_decimal::Decimal;
use std::sync::Arc;

/// [`MarketData`] implementation polling Bybit spot tickers and klines.
/// Works without credentials.
#[derive(Debug)]
pub struct BybitMarketData {
    client: Arc<BybitClient>,
    candle_interval_min: u32,
}

impl BybitMarketData {
    #[must_use]
    pub fn new(client: Arc<BybitClient>, candle_interval_min: u32) -> Self {
        Self {
            client,
            candle_interval_min,
        }
    }
}

#[async_trait]
impl MarketData for BybitMarketData {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        Ok(self.client.latest_price(symbol).await?)
    }

    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        Ok(self
            .client
            .klines(symbol, self.candle_interval_min, limit)
            .await?)
    }
}
