//! Moving averages and MACD.
//!
//! Every function returns a vector aligned to its input: `None` until enough
//! values exist to fill the look-back, `Some` afterwards.

/// Simple moving average over the trailing `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = flat_value(window).unwrap_or_else(|| window.iter().sum::<f64>() / period as f64);
        out[i] = Some(mean);
    }
    out
}

/// The shared value of a window whose values are all identical.
pub(super) fn flat_value(window: &[f64]) -> Option<f64> {
    let (&first, rest) = window.split_first()?;
    rest.iter().all(|&v| v == first).then_some(first)
}

/// Simple moving average over a sparse series. A window containing any
/// undefined value is itself undefined.
pub fn sma_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = window
            .iter()
            .copied()
            .sum::<Option<f64>>()
            .map(|sum| sum / period as f64);
    }
    out
}

/// Exponential moving average with smoothing factor `2 / (period + 1)`,
/// seeded by the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current += (values[i] - current) * k;
        out[i] = Some(current);
    }
    out
}

/// EMA over a series with an undefined prefix. Smoothing starts at the first
/// defined value and stops at the next gap.
pub fn ema_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    let dense: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in ema(&dense, period).into_iter().enumerate() {
        out[start + offset] = value;
    }
    out
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdOutput {
    /// Fast EMA - slow EMA
    pub line: Vec<Option<f64>>,
    /// EMA of the MACD line
    pub signal: Vec<Option<f64>>,
    /// Line - signal
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_sparse(&line, signal);
    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    MacdOutput {
        line,
        signal: signal_line,
        histogram,
    }
}
