//! Volatility bands.

use super::trend::{flat_value, sma};

/// Rolling population standard deviation over the trailing `period` values.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let n = period as f64;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if flat_value(window).is_some() {
            out[i] = Some(0.0);
            continue;
        }
        let mean = window.iter().sum::<f64>() / n;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        out[i] = Some(var.sqrt());
    }
    out
}

/// Bollinger upper/middle/lower bands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerOutput {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Bollinger bands: `SMA(period) ± std_dev * rolling_std(period)`.
pub fn bollinger(closes: &[f64], period: usize, std_dev: f64) -> BollingerOutput {
    let middle = sma(closes, period);
    let sd = rolling_std(closes, period);

    let band = |sign: f64| -> Vec<Option<f64>> {
        middle
            .iter()
            .zip(&sd)
            .map(|(m, s)| Some((*m)? + sign * std_dev * (*s)?))
            .collect()
    };
    let upper = band(1.0);
    let lower = band(-1.0);

    BollingerOutput {
        upper,
        middle,
        lower,
    }
}
