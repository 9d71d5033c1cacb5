//! Bybit v5 REST integration.
//!
//! This crate provides:
//! - a rate-limited REST client for Bybit's v5 spot API
//! - HMAC-SHA256 request signing (`X-BAPI-*` headers)
//! - a [`MarketData`](paper_trade_core::traits::MarketData) implementation
//!   over the public tickers/kline endpoints (no credentials needed)
//! - a live [`ExecutionHandler`](paper_trade_core::traits::ExecutionHandler)
//!   that places spot market orders
//!
//! # Authentication
//!
//! Credentials come from the `[exchange]` section of the application
//! config (or the `PAPER_TRADE_EXCHANGE__API_KEY` /
//! `PAPER_TRADE_EXCHANGE__API_SECRET` environment variables). Public
//! market data works without them.

pub mod auth;
pub mod client;
pub mod error;
pub mod execution;
pub mod market;

pub use auth::{BybitAuth, SignedHeaders};
pub use client::{BybitClient, BybitClientConfig, OrderSide, BYBIT_MAINNET_URL, BYBIT_TESTNET_URL};
pub use error::{BybitError, Result};
pub use execution::LiveExecutionHandler;
pub use market::BybitMarketData;
