// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Walk consecutive closes; the delta at index i is close[i]-close[i-1].
// Step 2 — Seed: sum gains / losses over the deltas at indices 1..=period and
//          divide by `period` to get the first average gain / loss.
// Step 3 — Apply Wilder's smoothing for every later index:
//            avg_gain = (avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss   (avg_loss of 0 divides by 1 instead)
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::IndicatorPoint;

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Compute the full RSI series for `candles` over `period`.
///
/// One point is emitted per candle from index `period` onward, so the output
/// has `candles.len() - period` points.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `candles.len() <= period` => empty vec
/// - Average loss of zero uses a divisor of 1, so an all-gain window reads
///   `100 - 100 / (1 + avg_gain)` rather than a hard 100.
/// - A NaN reading (only reachable from NaN closes) is emitted as 0.
pub fn calculate_rsi(candles: &[Candle], period: usize) -> Vec<IndicatorPoint> {
    if period == 0 || candles.len() <= period {
        return Vec::new();
    }

    let period_f = period as f64;

    // --- Seed averages over the first `period` deltas ------------------------
    let (sum_gain, sum_loss) = candles[..=period]
        .windows(2)
        .fold((0.0_f64, 0.0_f64), |(g, l), w| {
            let delta = w[1].close - w[0].close;
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(candles.len() - period);
    result.push(IndicatorPoint {
        time: candles[period].time,
        value: rsi_from_averages(avg_gain, avg_loss),
    });

    // --- Wilder's smoothing for subsequent values ----------------------------
    for i in period + 1..candles.len() {
        let delta = candles[i].close - candles[i - 1].close;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        result.push(IndicatorPoint {
            time: candles[i].time,
            value: rsi_from_averages(avg_gain, avg_loss),
        });
    }

    result
}

/// Overbought / oversold classification of a single RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

pub fn rsi_zone(value: f64) -> RsiZone {
    if value >= OVERBOUGHT {
        RsiZone::Overbought
    } else if value <= OVERSOLD {
        RsiZone::Oversold
    } else {
        RsiZone::Neutral
    }
}

/// Most recent RSI reading with its zone, or `None` on insufficient data.
pub fn current_rsi(candles: &[Candle], period: usize) -> Option<(f64, RsiZone)> {
    let value = calculate_rsi(candles, period).last()?.value;
    Some((value, rsi_zone(value)))
}

// =============================================================================
// Internal helpers
// =============================================================================

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let divisor = if avg_loss == 0.0 { 1.0 } else { avg_loss };
    let rs = avg_gain / divisor;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    if rsi.is_nan() {
        0.0
    } else {
        rsi
    }
}
