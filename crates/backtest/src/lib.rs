//! Historical candle replay through the live risk and execution stack.

pub mod engine;
pub mod history;
pub mod report;

pub use engine::BacktestEngine;
pub use history::load_candles;
pub use report::{BacktestReport, EquityPoint};
