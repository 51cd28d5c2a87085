// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean of the last `period` closes, one point per candle from index
// `period - 1` onward.
//
// Each window is summed from its own slice, so a spike or a NaN close only
// affects the windows that contain it.
// =============================================================================

use crate::market_data::Candle;

use super::IndicatorPoint;

/// Compute the SMA series for `candles` over `period` closes.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `candles.len() < period` => empty vec
/// - Output length is `candles.len() - period + 1` otherwise.
pub fn calculate_sma(candles: &[Candle], period: usize) -> Vec<IndicatorPoint> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(candles.len() - period + 1);
    for i in (period - 1)..candles.len() {
        let sum: f64 = candles[i + 1 - period..=i].iter().map(|c| c.close).sum();
        result.push(IndicatorPoint {
            time: candles[i].time,
            value: sum / period_f,
        });
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::candles_from_closes;

    #[test]
    fn sma_known_values() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let sma = calculate_sma(&candles, 3);
        let values: Vec<f64> = sma.iter().map(|p| p.value).collect();
        let times: Vec<i64> = sma.iter().map(|p| p.time).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(times, vec![candles[2].time, candles[3].time, candles[4].time]);
    }

    #[test]
    fn sma_empty_input() {
        assert!(calculate_sma(&[], 3).is_empty());
    }

    #[test]
    fn sma_period_zero() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        assert!(calculate_sma(&candles, 0).is_empty());
    }

    #[test]
    fn sma_period_longer_than_input() {
        let candles = candles_from_closes(&[1.0, 2.0]);
        assert!(calculate_sma(&candles, 3).is_empty());
    }

    #[test]
    fn sma_period_equals_length() {
        let candles = candles_from_closes(&[2.0, 4.0, 6.0]);
        let sma = calculate_sma(&candles, 3);
        assert_eq!(sma.len(), 1);
        assert!((sma[0].value - 4.0).abs() < 1e-12);
        assert_eq!(sma[0].time, candles[2].time);
    }

    #[test]
    fn sma_period_one_echoes_closes() {
        let closes = [3.5, 1.25, 8.0];
        let candles = candles_from_closes(&closes);
        let values: Vec<f64> = calculate_sma(&candles, 1).iter().map(|p| p.value).collect();
        assert_eq!(values, closes.to_vec());
    }

    #[test]
    fn sma_long_series_matches_naive_mean() {
        let closes: Vec<f64> = (0..2_000).map(|i| 100.0 + ((i * 37) % 101) as f64 * 0.173).collect();
        let candles = candles_from_closes(&closes);
        let period = 20;
        let sma = calculate_sma(&candles, period);
        assert_eq!(sma.len(), closes.len() - period + 1);
        for (k, point) in sma.iter().enumerate() {
            let naive: f64 = closes[k..k + period].iter().sum::<f64>() / period as f64;
            assert!((point.value - naive).abs() < 1e-9, "index {k}: {} vs {naive}", point.value);
        }
    }

    #[test]
    fn sma_spike_does_not_swallow_later_windows() {
        let candles = candles_from_closes(&[1e17, 1.0, 2.0, 3.0, 4.0]);
        let values: Vec<f64> = calculate_sma(&candles, 2).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5e16, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn sma_recovers_once_nan_leaves_window() {
        let candles = candles_from_closes(&[1.0, f64::NAN, 2.0, 3.0, 4.0, 5.0]);
        let values: Vec<f64> = calculate_sma(&candles, 2).iter().map(|p| p.value).collect();
        assert_eq!(values.len(), 5);
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert!((values[2] - 2.5).abs() < 1e-12);
        assert!((values[3] - 3.5).abs() < 1e-12);
        assert!((values[4] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn sma_is_restartable() {
        let candles = candles_from_closes(&[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(calculate_sma(&candles, 2), calculate_sma(&candles, 2));
    }
}
