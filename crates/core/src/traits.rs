use crate::events::{Candle, EntryOrder, ExitOrder, Fill, IndicatorSnapshot, Signal};
use crate::position::ClosedTrade;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest traded price for `symbol`, `None` when the venue has no
    /// quote for it.
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>>;

    /// Most recent candles for `symbol`, oldest first, at most `limit`.
    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Produces a trade proposal from the latest indicator snapshot, or
    /// `None` when the rules do not line up.
    async fn generate_signal(
        &self,
        snapshot: &IndicatorSnapshot,
        symbol: &str,
    ) -> Result<Option<Signal>>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    /// Fills an entry order. `None` means the order could not be priced
    /// (non-positive desired price with no usable fallback); sizing errors
    /// are `Err`.
    async fn fill_entry(&mut self, order: &EntryOrder) -> Result<Option<Fill>>;

    /// Fills an exit order. `None` when the desired price is non-positive.
    async fn fill_exit(&mut self, order: &ExitOrder) -> Result<Option<Fill>>;
}

pub trait TradeStore: Send + Sync {
    /// Persists one completed trade.
    fn add_trade(&self, trade: &ClosedTrade) -> Result<()>;
}
