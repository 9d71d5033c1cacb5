//! Indicator math over candle history.
//!
//! Series functions return vectors aligned with the input so composed
//! indicators stay index-stable; slots before an indicator's seed index
//! are warm-up and hold zero. Every function guards insufficient data
//! and zero denominators instead of returning NaN.

use paper_trade_core::events::{Candle, IndicatorSnapshot};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Minimum candle history for a full snapshot. Below this the neutral
/// snapshot is returned and no strategy will vote.
pub const MIN_CANDLES: usize = 30;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor `n`, not `n - 1`).
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn last_or(series: &[f64], default: f64) -> f64 {
    series
        .last()
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first average gain/loss is seeded at index `period` from the
/// first `period` deltas, then smoothed as
/// `avg[i] = (avg[i-1] * (period - 1) + delta[i]) / period`. A window
/// with zero average loss reads as RS 100.
#[must_use]
pub fn rsi(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let n = closes.len();
    let mut gains = vec![0.0; n - 1];
    let mut losses = vec![0.0; n - 1];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gains[i - 1] = delta;
        } else if delta < 0.0 {
            losses[i - 1] = -delta;
        }
    }

    let p = period as f64;
    let mut avg_gain = vec![0.0; n];
    let mut avg_loss = vec![0.0; n];
    avg_gain[period] = mean(&gains[..period]);
    avg_loss[period] = mean(&losses[..period]);
    for i in period + 1..n {
        avg_gain[i] = (avg_gain[i - 1] * (p - 1.0) + gains[i - 1]) / p;
        avg_loss[i] = (avg_loss[i - 1] * (p - 1.0) + losses[i - 1]) / p;
    }

    let mut out = vec![0.0; n];
    for i in period..n {
        let rs = if avg_loss[i] == 0.0 {
            100.0
        } else {
            avg_gain[i] / avg_loss[i]
        };
        out[i] = 100.0 - 100.0 / (1.0 + rs);
    }
    Some(out)
}

/// Simple moving average, valid from index `period - 1`.
#[must_use]
pub fn sma(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let n = prices.len();
    let mut out = vec![0.0; n];
    for i in period - 1..n {
        out[i] = mean(&prices[i + 1 - period..=i]);
    }
    Some(out)
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, valid from index `period - 1`.
#[must_use]
pub fn ema(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let n = prices.len();
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = vec![0.0; n];
    out[period - 1] = mean(&prices[..period]);
    for i in period..n {
        out[i] = prices[i] * multiplier + out[i - 1] * (1.0 - multiplier);
    }
    Some(out)
}

/// MACD line, signal line and histogram.
///
/// The MACD line is `ema(fast) - ema(slow)`. The signal line is an EMA
/// of the MACD values starting where the slow EMA is valid, so signal
/// and histogram are valid from index `slow + signal - 2`.
#[must_use]
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    if closes.len() < slow + signal {
        return None;
    }
    let ema_fast = ema(closes, fast)?;
    let ema_slow = ema(closes, slow)?;
    let n = closes.len();
    let macd_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();

    let signal_ema = ema(&macd_line[slow - 1..], signal)?;
    let mut signal_line = vec![0.0; n];
    for (k, value) in signal_ema.iter().enumerate().skip(signal - 1) {
        signal_line[slow - 1 + k] = *value;
    }

    let start = slow + signal - 2;
    let mut histogram = vec![0.0; n];
    for i in start..n {
        histogram[i] = macd_line[i] - signal_line[i];
    }
    Some((macd_line, signal_line, histogram))
}

/// Bollinger bands: SMA middle band with `std_mult` population standard
/// deviations either side, valid from index `period - 1`.
#[must_use]
pub fn bollinger_bands(
    prices: &[f64],
    period: usize,
    std_mult: f64,
) -> Option<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let middle = sma(prices, period)?;
    let n = prices.len();
    let mut upper = vec![0.0; n];
    let mut lower = vec![0.0; n];
    for i in period - 1..n {
        let std = population_std(&prices[i + 1 - period..=i]);
        upper[i] = middle[i] + std_mult * std;
        lower[i] = middle[i] - std_mult * std;
    }
    Some((upper, middle, lower))
}

/// Average True Range with Wilder smoothing, seeded at index `period`
/// from the mean of the first `period` true ranges.
#[must_use]
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<Vec<f64>> {
    let n = highs.len();
    if period == 0 || n < period + 1 || lows.len() != n || closes.len() != n {
        return None;
    }
    let mut tr = vec![0.0; n - 1];
    for i in 1..n {
        let range = highs[i] - lows[i];
        let high_close = (highs[i] - closes[i - 1]).abs();
        let low_close = (lows[i] - closes[i - 1]).abs();
        tr[i - 1] = range.max(high_close).max(low_close);
    }

    let p = period as f64;
    let mut out = vec![0.0; n];
    out[period] = mean(&tr[..period]);
    for i in period + 1..n {
        out[i] = (out[i - 1] * (p - 1.0) + tr[i - 1]) / p;
    }
    Some(out)
}

/// Last volume relative to the mean of the `period` volumes before it.
/// A zero average reads as 1.0.
#[must_use]
pub fn volume_ratio(volumes: &[f64], period: usize) -> Option<f64> {
    let n = volumes.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let current = volumes[n - 1];
    let average = mean(&volumes[n - 1 - period..n - 1]);
    if average == 0.0 {
        return Some(1.0);
    }
    let ratio = current / average;
    Some(if ratio.is_finite() { ratio } else { 1.0 })
}

/// Population standard deviation of the last `period` simple returns.
#[must_use]
pub fn volatility(prices: &[f64], period: usize) -> Option<f64> {
    let n = prices.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let window = &prices[n - 1 - period..];
    let mut returns = Vec::with_capacity(period);
    for i in 1..window.len() {
        returns.push((window[i] - window[i - 1]) / window[i - 1]);
    }
    let std = population_std(&returns);
    Some(if std.is_finite() { std } else { 0.01 })
}

/// Distance of the last price from the window mean in standard
/// deviations, over the trailing `period + 1` prices.
#[must_use]
pub fn z_score(prices: &[f64], period: usize) -> Option<f64> {
    let n = prices.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let window = &prices[n - 1 - period..];
    let mean_price = mean(window);
    let std_price = population_std(window);
    if std_price == 0.0 {
        return Some(0.0);
    }
    let z = (prices[n - 1] - mean_price) / std_price;
    Some(if z.is_finite() { z } else { 0.0 })
}

/// Last price relative to the price `period` candles earlier. A zero
/// reference price reads as 1.0.
#[must_use]
pub fn momentum(prices: &[f64], period: usize) -> Option<f64> {
    let n = prices.len();
    if period == 0 || n < period + 1 {
        return None;
    }
    let past = prices[n - 1 - period];
    if past == 0.0 {
        return Some(1.0);
    }
    let m = prices[n - 1] / past;
    Some(if m.is_finite() { m } else { 1.0 })
}

/// Position of `price` inside the band, 0 at the lower band and 1 at the
/// upper, clamped to `[0, 1]`. Collapsed bands read as 0.5.
#[must_use]
pub fn bb_position(price: f64, upper: f64, lower: f64) -> f64 {
    if upper == lower {
        return 0.5;
    }
    let position = (price - lower) / (upper - lower);
    if position.is_nan() {
        0.5
    } else {
        position.clamp(0.0, 1.0)
    }
}

/// Computes the full indicator snapshot over a candle window.
///
/// Fewer than [`MIN_CANDLES`] candles yields the neutral snapshot; any
/// single indicator that still lacks history (e.g. MACD below 35
/// candles) falls back to its neutral value individually.
#[must_use]
pub fn snapshot_from_candles(candles: &[Candle]) -> IndicatorSnapshot {
    let current_price = candles.last().map_or(Decimal::ZERO, |c| c.close);
    if candles.len() < MIN_CANDLES {
        return IndicatorSnapshot::neutral(current_price);
    }

    let closes: Vec<f64> = candles
        .iter()
        .map(|c| c.close.to_f64().unwrap_or(0.0))
        .collect();
    let highs: Vec<f64> = candles
        .iter()
        .map(|c| c.high.to_f64().unwrap_or(0.0))
        .collect();
    let lows: Vec<f64> = candles
        .iter()
        .map(|c| c.low.to_f64().unwrap_or(0.0))
        .collect();
    let volumes: Vec<f64> = candles
        .iter()
        .map(|c| c.volume.to_f64().unwrap_or(0.0))
        .collect();
    let price = closes.last().copied().unwrap_or(0.0);

    let mut snapshot = IndicatorSnapshot::neutral(current_price);

    if let Some(series) = rsi(&closes, 14) {
        snapshot.rsi_14 = last_or(&series, 50.0);
    }
    if let Some(series) = rsi(&closes, 7) {
        snapshot.rsi_7 = last_or(&series, 50.0);
    }

    if let Some((macd_line, signal_line, histogram)) = macd(&closes, 12, 26, 9) {
        snapshot.macd = last_or(&macd_line, 0.0);
        snapshot.macd_signal = last_or(&signal_line, 0.0);
        snapshot.macd_histogram = last_or(&histogram, 0.0);
    }

    if let Some((upper, middle, lower)) = bollinger_bands(&closes, 20, 2.0) {
        snapshot.bb_upper = last_or(&upper, price);
        snapshot.bb_middle = last_or(&middle, price);
        snapshot.bb_lower = last_or(&lower, price);
        snapshot.bb_position = bb_position(price, snapshot.bb_upper, snapshot.bb_lower);
    }

    if let Some(series) = atr(&highs, &lows, &closes, 14) {
        snapshot.atr = last_or(&series, price * 0.01);
    }

    snapshot.volume_ratio = volume_ratio(&volumes, 20).unwrap_or(1.0);
    snapshot.volatility = volatility(&closes, 20).unwrap_or(0.01);
    snapshot.z_score = z_score(&closes, 20).unwrap_or(0.0);
    snapshot.momentum = momentum(&closes, 10).unwrap_or(1.0);

    snapshot
}
