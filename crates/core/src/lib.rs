pub mod config;
pub mod config_loader;
pub mod events;
pub mod position;
pub mod traits;

pub use config::{
    AppConfig, DataConfig, ExchangeConfig, ExecutionConfig, ExecutionMode, MarketDataSource,
    RiskConfig, StorageConfig, StrategiesConfig, StrategyConfig, TradingConfig, ValidationConfig,
};
pub use config_loader::ConfigLoader;
pub use events::{
    Candle, EntryOrder, ExitOrder, Fill, IndicatorSnapshot, PriceMap, Signal, SignalAction,
};
pub use position::{CloseReason, ClosedTrade, Direction, ExitTrigger, Position};
pub use traits::{ExecutionHandler, MarketData, Strategy, TradeStore};
