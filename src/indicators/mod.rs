// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free chart overlays computed from an ordered candle slice.
// Degenerate input (no candles, a non-positive or oversized period) yields an
// empty series rather than an error.

pub mod rsi;
pub mod sma;

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

pub use rsi::{calculate_rsi, current_rsi, rsi_zone, RsiZone, OVERBOUGHT, OVERSOLD};
pub use sma::calculate_sma;

/// One point of an overlay series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}

/// An overlay requested by the chart. Periods arrive from clients as signed
/// integers; anything below 1 produces an empty series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum IndicatorSpec {
    Ma { period: i64 },
    Rsi { period: i64 },
}

impl IndicatorSpec {
    pub fn period(&self) -> i64 {
        match self {
            Self::Ma { period } | Self::Rsi { period } => *period,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Ma { period } => format!("MA-{period}"),
            Self::Rsi { period } => format!("RSI-{period}"),
        }
    }
}

/// Horizontal guide lines drawn on the oscillator pane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub overbought: f64,
    pub oversold: f64,
}

/// A computed overlay ready for the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: String,
    pub spec: IndicatorSpec,
    pub points: Vec<IndicatorPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<Bands>,
}

/// Simple moving average with a client-supplied (possibly negative) period.
pub fn sma(candles: &[Candle], period: i64) -> Vec<IndicatorPoint> {
    match usize::try_from(period) {
        Ok(p) => calculate_sma(candles, p),
        Err(_) => Vec::new(),
    }
}

/// Wilder RSI with a client-supplied (possibly negative) period.
pub fn rsi(candles: &[Candle], period: i64) -> Vec<IndicatorPoint> {
    match usize::try_from(period) {
        Ok(p) => calculate_rsi(candles, p),
        Err(_) => Vec::new(),
    }
}

/// Compute every requested overlay, in request order.
///
/// The chart has a single oscillator pane, so only the first RSI request is
/// honoured; later ones are skipped.
pub fn compute_overlays(candles: &[Candle], specs: &[IndicatorSpec]) -> Vec<Overlay> {
    let mut overlays = Vec::with_capacity(specs.len());
    let mut has_rsi = false;

    for (index, spec) in specs.iter().enumerate() {
        let id = format!("{}-{index}", spec.label());
        match *spec {
            IndicatorSpec::Ma { period } => overlays.push(Overlay {
                id,
                spec: *spec,
                points: sma(candles, period),
                bands: None,
            }),
            IndicatorSpec::Rsi { period } => {
                if has_rsi {
                    continue;
                }
                has_rsi = true;
                overlays.push(Overlay {
                    id,
                    spec: *spec,
                    points: rsi(candles, period),
                    bands: Some(Bands {
                        overbought: OVERBOUGHT,
                        oversold: OVERSOLD,
                    }),
                });
            }
        }
    }

    overlays
}

/// Build one-minute candles whose close is each value in `closes`.
#[cfg(test)]
pub(crate) fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::flat(1_700_000_000 + i as i64 * 60, c))
        .collect()
}
