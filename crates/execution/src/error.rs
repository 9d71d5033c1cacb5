use rust_decimal::Decimal;
use thiserror::Error;

/// Caller errors from the execution layer. Unpriceable orders are reported
/// as `None` fills, not through this enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("non-positive size {size} for {symbol}")]
    NonPositiveSize { symbol: String, size: Decimal },
}
