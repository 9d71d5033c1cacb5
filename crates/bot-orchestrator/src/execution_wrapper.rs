use anyhow::{bail, Result};
use async_trait::async_trait;
use paper_trade_bybit::{BybitClient, LiveExecutionHandler};
use paper_trade_core::config::{AppConfig, ExecutionMode};
use paper_trade_core::events::{EntryOrder, ExitOrder, Fill};
use paper_trade_core::traits::ExecutionHandler;
use paper_trade_execution::PaperExecutionHandler;
use std::sync::Arc;
use tracing::{info, warn};

/// Execution backend selected at startup. Static dispatch over the two
/// modes keeps the trader free of trait objects on the order path.
#[derive(Debug)]
pub enum ExecutionWrapper {
    Paper(PaperExecutionHandler),
    Live(Box<LiveExecutionHandler>),
}

impl ExecutionWrapper {
    /// Builds the backend for `config.trading.mode`.
    ///
    /// # Errors
    /// Live mode refuses to start without exchange API credentials or
    /// when the REST client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let has_credentials =
            !config.exchange.api_key.is_empty() && !config.exchange.api_secret.is_empty();
        match config.trading.mode {
            ExecutionMode::Paper => {
                if has_credentials {
                    warn!("exchange credentials configured but paper trading mode is active");
                }
                info!(
                    slippage_pct = config.execution.slippage_pct,
                    fee_rate = config.trading.fee_rate,
                    "paper execution enabled"
                );
                Ok(Self::Paper(PaperExecutionHandler::from_config(config)))
            }
            ExecutionMode::Live => {
                let client = BybitClient::from_config(config)?;
                if !client.is_authenticated() {
                    bail!("live trading mode requires exchange API credentials");
                }
                info!(rest_url = %client.base_url(), "live execution enabled");
                Ok(Self::Live(Box::new(LiveExecutionHandler::new(
                    Arc::new(client),
                    config.trading.fee_rate,
                ))))
            }
        }
    }
}

#[async_trait]
impl ExecutionHandler for ExecutionWrapper {
    async fn fill_entry(&mut self, order: &EntryOrder) -> Result<Option<Fill>> {
        match self {
            Self::Paper(handler) => handler.fill_entry(order).await,
            Self::Live(handler) => handler.fill_entry(order).await,
        }
    }

    async fn fill_exit(&mut self, order: &ExitOrder) -> Result<Option<Fill>> {
        match self {
            Self::Paper(handler) => handler.fill_exit(order).await,
            Self::Live(handler) => handler.fill_exit(order).await,
        }
    }
}
