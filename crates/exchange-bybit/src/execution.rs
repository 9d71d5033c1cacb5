//! Live order execution against Bybit spot.

use crate::client::{BybitClient, OrderSide};
use crate::error::BybitError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use paper_trade_core::events::{EntryOrder, ExitOrder, Fill};
use paper_trade_core::traits::ExecutionHandler;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Submits market orders through the signed REST client.
///
/// Market-order fills are not polled for confirmation, so the returned
/// `Fill` reports the *requested* price as the fill approximation with
/// zero slippage. This is deliberate, documented behavior; resolving it
/// would mean polling `/v5/order/realtime` for the executed price.
#[derive(Debug)]
pub struct LiveExecutionHandler {
    client: Arc<BybitClient>,
    fee_rate: Decimal,
}

impl LiveExecutionHandler {
    #[must_use]
    pub fn new(client: Arc<BybitClient>, fee_rate: f64) -> Self {
        Self {
            client,
            fee_rate: Decimal::try_from(fee_rate).unwrap_or_default(),
        }
    }

    fn approximate_fill(&self, symbol: &str, price: Decimal, size: Decimal) -> Fill {
        let fee = price * size * self.fee_rate;
        Fill {
            symbol: symbol.to_string(),
            filled_price: price,
            fee,
            total_cost: price * size + fee,
            slippage: 0.0,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl ExecutionHandler for LiveExecutionHandler {
    async fn fill_entry(&mut self, order: &EntryOrder) -> Result<Option<Fill>> {
        if order.size <= Decimal::ZERO {
            return Err(BybitError::InvalidOrder(format!(
                "non-positive size {} for {}",
                order.size, order.symbol
            ))
            .into());
        }

        let desired_price = if order.desired_price > Decimal::ZERO {
            order.desired_price
        } else {
            match order.fallback_price {
                Some(fallback) if fallback > Decimal::ZERO => {
                    warn!(
                        symbol = %order.symbol,
                        fallback = %fallback,
                        "desired entry price not positive, using fallback"
                    );
                    fallback
                }
                _ => {
                    warn!(symbol = %order.symbol, "no positive entry price available");
                    return Ok(None);
                }
            }
        };

        let side = OrderSide::entry(order.direction);
        let order_id = self
            .client
            .place_market_order(&order.symbol, side, order.size)
            .await?;

        info!(
            symbol = %order.symbol,
            side = side.as_str(),
            size = %order.size,
            order_id = %order_id,
            approx_price = %desired_price,
            "entry order placed (live)"
        );

        Ok(Some(self.approximate_fill(
            &order.symbol,
            desired_price,
            order.size,
        )))
    }

    async fn fill_exit(&mut self, order: &ExitOrder) -> Result<Option<Fill>> {
        if order.size <= Decimal::ZERO {
            return Err(BybitError::InvalidOrder(format!(
                "non-positive size {} for {}",
                order.size, order.symbol
            ))
            .into());
        }

        if order.desired_price <= Decimal::ZERO {
            warn!(
                symbol = %order.symbol,
                desired = %order.desired_price,
                "exit price not positive, cannot place order"
            );
            return Ok(None);
        }

        let side = OrderSide::exit(order.direction);
        let order_id = self
            .client
            .place_market_order(&order.symbol, side, order.size)
            .await?;

        info!(
            symbol = %order.symbol,
            side = side.as_str(),
            size = %order.size,
            order_id = %order_id,
            approx_price = %order.desired_price,
            "exit order placed (live)"
        );

        Ok(Some(self.approximate_fill(
            &order.symbol,
            order.desired_price,
            order.size,
        )))
    }
}
