//! Momentum oscillators: RSI and the stochastic oscillator.

use super::trend::sma_sparse;
use crate::OHLCV;

/// Relative Strength Index with Wilder's smoothing.
///
/// Gains and losses are smoothed with factor `1 / period`, starting from the
/// first bar whose change counts as 0. The first value appears at index
/// `period - 1`. Average loss of zero maps to 100, or to 50 when there was no
/// movement at all.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let alpha = 1.0 / period as f64;
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
    let mut prev = closes[0];

    for (i, &close) in closes.iter().enumerate() {
        let change = close - prev;
        prev = close;
        avg_gain += (change.max(0.0) - avg_gain) * alpha;
        avg_loss += ((-change).max(0.0) - avg_loss) * alpha;
        if i + 1 >= period {
            out[i] = Some(rsi_value(avg_gain, avg_loss));
        }
    }
    out
}

#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        if avg_gain > 0.0 {
            100.0
        } else {
            50.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Stochastic %K and %D
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StochasticOutput {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Stochastic oscillator over `period` bars with a `smooth`-bar %D.
///
/// %K is undefined where the rolling high equals the rolling low.
pub fn stochastic<T: OHLCV>(bars: &[T], period: usize, smooth: usize) -> StochasticOutput {
    let mut k = vec![None; bars.len()];
    if period > 0 && bars.len() >= period {
        for i in (period - 1)..bars.len() {
            let window = &bars[i + 1 - period..=i];
            let highest = window.iter().map(|b| b.high()).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low()).fold(f64::MAX, f64::min);
            let span = highest - lowest;
            if span > 0.0 {
                k[i] = Some(100.0 * (bars[i].close() - lowest) / span);
            }
        }
    }
    let d = sma_sparse(&k, smooth);
    StochasticOutput { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Bar;
    use chrono::NaiveDate;

    fn bars_from(hlc: &[(f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        hlc.iter()
            .enumerate()
            .map(|(i, &(h, l, c))| {
                Bar::new(start + chrono::Days::new(i as u64), c, h, l, c, 100)
            })
            .collect()
    }

    #[test]
    fn test_rsi_prefix() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let out = rsi(&closes, 14);
        assert!(out[..13].iter().all(Option::is_none));
        assert!(out[13..].iter().all(Option::is_some));
    }

    #[test]
    fn test_rsi_extremes() {
        let up: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&up, 14)[19], Some(100.0));

        let down: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(rsi(&down, 14)[19], Some(0.0));

        assert_eq!(rsi(&[10.0; 20], 14)[19], Some(50.0));
    }

    #[test]
    fn test_rsi_wilder_step() {
        // changes 0, +2, -1, +2 smoothed with alpha 1/2
        let out = rsi(&[10.0, 12.0, 11.0, 13.0], 2);
        assert_eq!(out[0], None);
        // gain 1, loss 0
        assert_eq!(out[1], Some(100.0));
        // gain 0.5, loss 0.5
        assert!((out[2].unwrap() - 50.0).abs() < 1e-9);
        // gain 1.25, loss 0.25
        let last = 100.0 - 100.0 / (1.0 + 1.25 / 0.25);
        assert!((out[3].unwrap() - last).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_short_input() {
        assert!(rsi(&[1.0; 13], 14).iter().all(Option::is_none));
        assert_eq!(rsi(&[1.0; 14], 14)[13], Some(50.0));
        assert!(rsi(&[], 14).is_empty());
    }

    #[test]
    fn test_stochastic_values() {
        let bars = bars_from(&[(10.0, 8.0, 9.0), (12.0, 9.0, 11.0), (11.0, 7.0, 10.0)]);
        let out = stochastic(&bars, 3, 1);
        assert_eq!(out.k[..2], [None, None]);
        // highest 12, lowest 7, close 10
        assert!((out.k[2].unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(out.d[2], out.k[2]);
    }

    #[test]
    fn test_stochastic_flat_range_undefined() {
        let bars = bars_from(&[(5.0, 5.0, 5.0); 5]);
        let out = stochastic(&bars, 3, 3);
        assert!(out.k.iter().all(Option::is_none));
        assert!(out.d.iter().all(Option::is_none));
    }
}
