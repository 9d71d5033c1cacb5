use rust_decimal::Decimal;
use thiserror::Error;

/// Caller errors. Business-rule rejections (insufficient capital, breached
/// limits, duplicate opens) are reported through `bool`/`Option` returns,
/// never through this enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    #[error("non-positive price {price} for {symbol}")]
    NonPositivePrice { symbol: String, price: Decimal },

    #[error("non-positive size {size} for {symbol}")]
    NonPositiveSize { symbol: String, size: Decimal },
}
