//! Market data providers and trade persistence.

pub mod mock;
pub mod storage;

pub use mock::MockMarketData;
pub use storage::{JsonTradeStore, StorageError, TradeStatistics};
