use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use paper_trade_core::events::Candle;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Raw CSV row: `timestamp,open,high,low,close,volume`.
#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// Accepts RFC 3339 timestamps or unix epoch milliseconds as written by
/// exchange kline exports.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return Some(parsed);
    }
    let millis = raw.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Loads candles for `symbol` from a headed CSV file and returns them
/// sorted oldest first.
///
/// # Errors
/// Returns an error if the file cannot be opened or any row fails to
/// parse.
pub fn load_candles(path: &Path, symbol: &str) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening candle file {}", path.display()))?;

    let mut candles = Vec::new();
    for (index, row) in reader.deserialize::<CandleRow>().enumerate() {
        let row = row.with_context(|| format!("candle row {}", index + 1))?;
        let timestamp = parse_timestamp(&row.timestamp).with_context(|| {
            format!("candle row {}: bad timestamp {:?}", index + 1, row.timestamp)
        })?;
        candles.push(Candle {
            symbol: symbol.to_string(),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            timestamp,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    info!(
        symbol,
        candles = candles.len(),
        path = %path.display(),
        "loaded candle history"
    );
    Ok(candles)
}
