//! Bybit v5 REST client with rate limiting.
//!
//! Public market endpoints work without credentials; order placement
//! requires a configured [`BybitAuth`]. All requests pass through a
//! `governor` rate limiter before hitting the wire.

use crate::auth::BybitAuth;
use crate::error::{BybitError, Result};
use chrono::{TimeZone, Utc};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use paper_trade_core::config::AppConfig;
use paper_trade_core::events::Candle;
use paper_trade_core::position::Direction;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

pub const BYBIT_MAINNET_URL: &str = "https://api.bybit.com";
pub const BYBIT_TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// Side of a spot order, in Bybit's capitalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that opens a position in `direction`.
    #[must_use]
    pub const fn entry(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Buy,
            Direction::Short => Self::Sell,
        }
    }

    /// Side that closes a position in `direction`.
    #[must_use]
    pub const fn exit(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Sell,
            Direction::Short => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct BybitClientConfig {
    pub base_url: String,
    pub requests_per_minute: NonZeroU32,
    pub timeout_secs: u64,
}

impl Default for BybitClientConfig {
    fn default() -> Self {
        Self {
            base_url: BYBIT_MAINNET_URL.to_string(),
            requests_per_minute: nonzero!(120u32),
            timeout_secs: 10,
        }
    }
}

impl BybitClientConfig {
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// API response types
// =============================================================================

/// Bybit v5 response envelope: `{retCode, retMsg, result}`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TickersResult {
    #[serde(default)]
    list: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(rename = "lastPrice")]
    last_price: String,
}

/// Kline rows arrive as string arrays:
/// `[startTime, open, high, low, close, volume, turnover]`, newest first.
#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OrderResult {
    #[serde(rename = "orderId")]
    order_id: String,
}

// =============================================================================
// Kline parsing
// =============================================================================

/// Parses raw kline rows into candles, oldest first.
///
/// Malformed rows (wrong arity, unparseable or non-positive prices) are
/// skipped with a warning; an inconsistent high/low is widened to cover
/// open and close rather than dropped.
fn parse_kline_rows(symbol: &str, rows: &[Vec<String>]) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        if row.len() < 7 {
            warn!(symbol, idx, "kline row too short, skipping");
            continue;
        }

        let start_ms: i64 = match row[0].parse::<f64>() {
            Ok(ms) => ms as i64,
            Err(_) => {
                warn!(symbol, idx, "unparseable kline timestamp, skipping");
                continue;
            }
        };
        let Some(timestamp) = Utc.timestamp_millis_opt(start_ms).single() else {
            warn!(symbol, idx, "out-of-range kline timestamp, skipping");
            continue;
        };

        let parsed: Option<Vec<Decimal>> = row[1..6].iter().map(|s| s.parse().ok()).collect();
        let Some(fields) = parsed else {
            warn!(symbol, idx, "unparseable kline fields, skipping");
            continue;
        };
        let (open, mut high, mut low, close, volume) =
            (fields[0], fields[1], fields[2], fields[3], fields[4]);

        if open <= Decimal::ZERO
            || high <= Decimal::ZERO
            || low <= Decimal::ZERO
            || close <= Decimal::ZERO
        {
            warn!(symbol, idx, "non-positive kline price, skipping");
            continue;
        }

        if !(low <= open && open <= high && low <= close && close <= high) {
            warn!(symbol, idx, "inconsistent OHLC, widening high/low");
            low = low.min(open).min(close).min(high);
            high = high.max(open).max(close).max(low);
        }

        candles.push(Candle {
            symbol: symbol.to_string(),
            open,
            high,
            low,
            close,
            volume: volume.max(Decimal::ZERO),
            timestamp,
        });
    }

    // Bybit returns newest first.
    candles.reverse();
    candles
}

fn param_str(params: &BTreeMap<&'static str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

// =============================================================================
// BybitClient
// =============================================================================

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited Bybit v5 REST client.
pub struct BybitClient {
    config: BybitClientConfig,
    http: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    auth: Option<BybitAuth>,
}

impl std::fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

impl BybitClient {
    /// Creates a client for public endpoints only.
    pub fn new(config: BybitClientConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Creates a client that can also place orders.
    pub fn with_auth(config: BybitClientConfig, auth: BybitAuth) -> Result<Self> {
        Self::build(config, Some(auth))
    }

    /// Builds a client from the application config: base URL from the
    /// exchange section, credentials attached when both are present.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client_config = BybitClientConfig::default()
            .with_base_url(config.exchange.rest_url.trim_end_matches('/'));
        let auth = if config.exchange.api_key.is_empty() || config.exchange.api_secret.is_empty() {
            None
        } else {
            Some(BybitAuth::from_config(&config.exchange)?)
        };
        Self::build(client_config, auth)
    }

    fn build(config: BybitClientConfig, auth: Option<BybitAuth>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BybitError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
            auth,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    // =========================================================================
    // Market endpoints (public)
    // =========================================================================

    /// Latest spot price for `symbol`, `None` when the ticker list is empty.
    pub async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let mut params = BTreeMap::new();
        params.insert("category", "spot".to_string());
        params.insert("symbol", symbol.to_string());

        let result: TickersResult = self.get_public("/v5/market/tickers", &params).await?;
        let Some(entry) = result.list.first() else {
            return Ok(None);
        };
        let price = entry.last_price.parse::<Decimal>().map_err(|e| {
            BybitError::Serialization(format!("bad lastPrice {:?}: {e}", entry.last_price))
        })?;
        Ok(Some(price))
    }

    /// Recent spot klines for `symbol`, oldest first.
    pub async fn klines(
        &self,
        symbol: &str,
        interval_min: u32,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let mut params = BTreeMap::new();
        params.insert("category", "spot".to_string());
        params.insert("symbol", symbol.to_string());
        params.insert("interval", interval_min.to_string());
        params.insert("limit", limit.to_string());

        let result: KlineResult = self.get_public("/v5/market/kline", &params).await?;
        Ok(parse_kline_rows(symbol, &result.list))
    }

    // =========================================================================
    // Trade endpoints (signed)
    // =========================================================================

    /// Places a spot market order and returns the exchange order id.
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<String> {
        if qty <= Decimal::ZERO {
            return Err(BybitError::InvalidOrder(format!(
                "non-positive qty {qty} for {symbol}"
            )));
        }

        let mut params = BTreeMap::new();
        params.insert("category", "spot".to_string());
        params.insert("symbol", symbol.to_string());
        params.insert("side", side.as_str().to_string());
        params.insert("orderType", "Market".to_string());
        params.insert("qty", qty.to_string());
        params.insert("timeInForce", "GTC".to_string());

        let result: OrderResult = self.post_signed("/v5/order/create", &params).await?;
        Ok(result.order_id)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    async fn get_public<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &BTreeMap<&'static str, String>,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .query(params)
            .header("Accept", "application/json")
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn post_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &BTreeMap<&'static str, String>,
    ) -> Result<T> {
        let Some(auth) = &self.auth else {
            return Err(BybitError::Configuration(
                "API credentials required for signed requests".to_string(),
            ));
        };

        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        let headers = auth.signed_headers(&param_str(params))?;
        debug!("POST {url}");

        let mut request = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        for (name, value) in headers.as_tuples() {
            request = request.header(name, value);
        }
        let response = request.json(params).send().await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(BybitError::RateLimit {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BybitError::http(status.as_u16(), text));
        }

        let envelope = response.json::<ApiEnvelope<T>>().await?;
        if envelope.ret_code != 0 {
            return Err(BybitError::api(envelope.ret_code, envelope.ret_msg));
        }
        envelope
            .result
            .ok_or_else(|| BybitError::MissingData("envelope had no result".to_string()))
    }
}
