//! Technical indicators
//!
//! Wilder-smoothed RSI over a price series. Output is aligned with the
//! input: indices before the warm-up period are `None` and must not be
//! treated as a signal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("insufficient data: have {have} prices, need more than {need}")]
    InsufficientData { have: usize, need: usize },
}

/// Calculate RSI (Relative Strength Index) with Wilder smoothing
///
/// Seeds the average gain/loss from the first `period` price deltas, then
/// updates both with weight `1/period` per step. Values are always within
/// [0, 100]; when the smoothed average loss is zero the ratio saturates at
/// 100 instead of dividing by zero.
pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    if period == 0 || prices.len() <= period {
        return Err(IndicatorError::InsufficientData {
            have: prices.len(),
            need: period,
        });
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = deltas[..period]
        .iter()
        .filter(|&&d| d > 0.0)
        .sum::<f64>()
        / period as f64;
    let mut avg_loss = deltas[..period]
        .iter()
        .filter(|&&d| d < 0.0)
        .map(|d| -d)
        .sum::<f64>()
        / period as f64;

    let mut values: Vec<Option<f64>> = vec![None; period];
    values.push(Some(rsi_value(avg_gain, avg_loss)));

    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };

        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;

        values.push(Some(rsi_value(avg_gain, avg_loss)));
    }

    Ok(values)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Latest defined RSI value for a series
///
/// This is what the decision engine consumes each tick.
pub fn latest_rsi(prices: &[f64], period: usize) -> Result<f64, IndicatorError> {
    let values = rsi(prices, period)?;
    // len > period is guaranteed, so the last element is Some
    Ok(values
        .last()
        .copied()
        .flatten()
        .expect("last RSI value is defined when len > period"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        let err = rsi(&prices, 14).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData { have: 3, need: 14 }
        ));
    }

    #[test]
    fn test_rsi_length_matches_input() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + (i % 7) as f64).collect();
        let values = rsi(&prices, 14).unwrap();
        assert_eq!(values.len(), prices.len());
    }

    #[test]
    fn test_warmup_indices_are_undefined() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let values = rsi(&prices, 14).unwrap();

        assert!(values[..14].iter().all(|v| v.is_none()));
        assert!(values[14..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_rsi_bounded_for_mixed_series() {
        let prices: Vec<f64> = (0..100)
            .map(|i| 28_000.0 + ((i * 37) % 11) as f64 * 50.0 - 250.0)
            .collect();

        for v in rsi(&prices, 14).unwrap().into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {} out of bounds", v);
        }
    }

    #[test]
    fn test_all_gains_saturates_at_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let last = latest_rsi(&prices, 14).unwrap();
        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_all_losses_tends_to_zero() {
        let prices: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        let last = latest_rsi(&prices, 14).unwrap();
        assert_eq!(last, 0.0);
    }

    #[test]
    fn test_uptrend_reads_high_downtrend_reads_low() {
        // Mostly rising with small dips, then the mirror image
        let up: Vec<f64> = (0..40)
            .map(|i| 100.0 + i as f64 * 2.0 - if i % 5 == 0 { 1.0 } else { 0.0 })
            .collect();
        let down: Vec<f64> = up.iter().map(|p| 300.0 - p).collect();

        assert!(latest_rsi(&up, 14).unwrap() > 70.0);
        assert!(latest_rsi(&down, 14).unwrap() < 30.0);
    }

    #[test]
    fn test_flat_series_has_no_losses() {
        // No movement at all: avg loss is zero, value saturates rather
        // than dividing by zero
        let prices = vec![100.0; 20];
        assert_eq!(latest_rsi(&prices, 14).unwrap(), 100.0);
    }

    #[test]
    fn test_wilder_smoothing_seed_value() {
        // period=3, deltas: +2, -1, +1 -> avg_gain = 1.0, avg_loss = 1/3
        // rs = 3, rsi = 100 - 100/4 = 75
        let prices = vec![10.0, 12.0, 11.0, 12.0];
        let values = rsi(&prices, 3).unwrap();
        assert_relative_eq!(values[3].unwrap(), 75.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wilder_smoothing_update_step() {
        // Extends the seed case by one flat delta:
        // avg_gain = (1.0*2 + 0)/3 = 2/3, avg_loss = (1/3*2 + 0)/3 = 2/9
        // rs = 3, rsi = 75 again
        let prices = vec![10.0, 12.0, 11.0, 12.0, 12.0];
        let values = rsi(&prices, 3).unwrap();
        assert_relative_eq!(values[4].unwrap(), 75.0, epsilon = 1e-9);
    }
}
