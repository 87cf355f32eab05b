//! Summary statistics
//!
//! Scalar risk/return figures over a symbol's history plus the latest indicator
//! values, with display formatting for key-value presentation.

use chrono::NaiveDate;
use serde::Serialize;

use crate::indicators::AugmentedSeries;
use crate::store::{Bar, Series};
use crate::{AnalysisError, Result};

/// Trading days per year used for annualization
pub const TRADING_DAYS: f64 = 252.0;

/// Daily return std-dev at or below this counts as no volatility
const ZERO_VOLATILITY: f64 = 1e-12;

/// Annualized return, volatility and Sharpe ratio
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskMetrics {
    /// Mean daily return x 252
    pub annualized_return: f64,
    /// Sample std-dev of daily returns x sqrt(252)
    pub annualized_volatility: f64,
    /// Return / volatility, 0 when volatility is 0
    pub sharpe_ratio: f64,
}

impl RiskMetrics {
    fn from_bars(bars: &[Bar]) -> Self {
        let returns: Vec<f64> = bars
            .windows(2)
            .filter(|w| w[0].close > 0.0)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect();

        let n = returns.len();
        if n == 0 {
            return Self::default();
        }
        let mean = returns.iter().sum::<f64>() / n as f64;
        let std = if n < 2 {
            0.0
        } else {
            let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        };
        // identical returns can leave rounding noise in the variance
        let std = if std <= ZERO_VOLATILITY { 0.0 } else { std };

        let annualized_return = mean * TRADING_DAYS;
        let annualized_volatility = std * TRADING_DAYS.sqrt();
        let sharpe_ratio = if annualized_volatility > 0.0 {
            annualized_return / annualized_volatility
        } else {
            0.0
        };

        Self {
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
        }
    }
}

/// Risk/return metrics over the whole series.
pub fn risk_metrics(series: &Series) -> Result<RiskMetrics> {
    if series.is_empty() {
        return Err(AnalysisError::EmptySeries {
            symbol: series.symbol().to_string(),
        });
    }
    Ok(RiskMetrics::from_bars(series.bars()))
}

/// Snapshot of one symbol as of its last bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub current_price: f64,
    /// Highest high over the supplied series
    pub period_high: f64,
    /// Lowest low over the supplied series
    pub period_low: f64,
    pub average_volume: f64,
    pub annualized_volatility: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_mid: Option<f64>,
    pub sma_long: Option<f64>,
    /// Periods of the three SMA values, used for their labels
    pub sma_periods: [usize; 3],
}

/// Summarize an augmented series. Fails on an empty series.
pub fn summarize(series: &AugmentedSeries) -> Result<Summary> {
    let bars = series.bars();
    let Some(last) = bars.last() else {
        return Err(AnalysisError::EmptySeries {
            symbol: series.symbol().to_string(),
        });
    };

    let period_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let period_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let average_volume = bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64;
    let risk = RiskMetrics::from_bars(bars);
    let latest = series.at(bars.len() - 1);

    Ok(Summary {
        symbol: series.symbol().to_string(),
        as_of: last.date,
        current_price: last.close,
        period_high,
        period_low,
        average_volume,
        annualized_volatility: risk.annualized_volatility,
        annualized_return: risk.annualized_return,
        sharpe_ratio: risk.sharpe_ratio,
        rsi: latest.rsi,
        macd: latest.macd,
        sma_short: latest.sma_short,
        sma_mid: latest.sma_mid,
        sma_long: latest.sma_long,
        sma_periods: series.sma_periods(),
    })
}

impl Summary {
    pub fn risk(&self) -> RiskMetrics {
        RiskMetrics {
            annualized_return: self.annualized_return,
            annualized_volatility: self.annualized_volatility,
            sharpe_ratio: self.sharpe_ratio,
        }
    }

    /// Ordered `(label, value)` pairs for key-value display.
    pub fn display_rows(&self) -> Vec<(String, String)> {
        let [short, mid, long] = self.sma_periods;
        let mut rows = vec![
            ("Symbol".to_string(), self.symbol.clone()),
            ("Current Price".to_string(), dollars(self.current_price)),
            ("52-Week High".to_string(), dollars(self.period_high)),
            ("52-Week Low".to_string(), dollars(self.period_low)),
            ("Average Volume".to_string(), thousands(self.average_volume)),
            ("Volatility".to_string(), percent(self.annualized_volatility)),
            ("Annual Return".to_string(), percent(self.annualized_return)),
            ("Sharpe Ratio".to_string(), format!("{:.2}", self.sharpe_ratio)),
            ("RSI".to_string(), optional(self.rsi, |v| format!("{v:.2}"))),
            ("MACD".to_string(), optional(self.macd, |v| format!("{v:.2}"))),
        ];
        rows.extend([
            (format!("SMA_{short}"), optional(self.sma_short, dollars)),
            (format!("SMA_{mid}"), optional(self.sma_mid, dollars)),
            (format!("SMA_{long}"), optional(self.sma_long, dollars)),
        ]);
        rows
    }
}

// ============================================================
// FORMATTING
// ============================================================

fn dollars(value: f64) -> String {
    format!("${value:.2}")
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn optional(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "n/a".to_string(), fmt)
}

/// Rounded to a whole number with comma thousands separators.
fn thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{IndicatorConfig, IndicatorEngine};
    use crate::Period;

    fn series(closes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(start + chrono::Days::new(i as u64), c, c + 1.0, c - 1.0, c, 1_000 + i as u64)
            })
            .collect();
        Series::new("TST", bars)
    }

    #[test]
    fn test_flat_series_zero_sharpe() {
        let m = risk_metrics(&series(&[50.0; 30])).unwrap();
        assert_eq!(m.annualized_volatility, 0.0);
        assert_eq!(m.annualized_return, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_single_bar() {
        let s = series(&[12.5]);
        assert_eq!(risk_metrics(&s).unwrap(), RiskMetrics::default());

        let summary = summarize(&IndicatorEngine::default().augment(&s)).unwrap();
        assert_eq!(summary.current_price, 12.5);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert!(summary.rsi.is_none());
    }

    #[test]
    fn test_constant_growth_zero_sharpe() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let m = risk_metrics(&series(&closes)).unwrap();
        assert!((m.annualized_return - 0.01 * 252.0).abs() < 1e-9);
        assert_eq!(m.annualized_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_two_bars_volatility_zero() {
        let m = risk_metrics(&series(&[100.0, 110.0])).unwrap();
        assert!((m.annualized_return - 0.1 * 252.0).abs() < 1e-9);
        assert_eq!(m.annualized_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_known_returns() {
        // +10%, -10%
        let m = risk_metrics(&series(&[100.0, 110.0, 99.0])).unwrap();
        assert!(m.annualized_return.abs() < 1e-12);
        let expected = (0.02f64).sqrt() * 252f64.sqrt();
        assert!((m.annualized_volatility - expected).abs() < 1e-9);
        assert!(m.sharpe_ratio.abs() < 1e-9);
    }

    #[test]
    fn test_empty_series() {
        let s = Series::new("NONE", Vec::new());
        assert!(matches!(
            risk_metrics(&s),
            Err(AnalysisError::EmptySeries { .. })
        ));
        let aug = IndicatorEngine::default().augment(&s);
        assert!(summarize(&aug).is_err());
    }

    #[test]
    fn test_summary_fields() {
        let closes: Vec<f64> = (0..60).map(|i| 20.0 + i as f64 * 0.5).collect();
        let summary = summarize(&IndicatorEngine::default().augment(&series(&closes))).unwrap();
        assert_eq!(summary.current_price, 49.5);
        assert_eq!(summary.period_high, 50.5);
        assert_eq!(summary.period_low, 19.0);
        assert!((summary.average_volume - 1029.5).abs() < 1e-9);
        assert!(summary.sma_mid.is_some());
        assert!(summary.sma_long.is_none());
        assert_eq!(summary.risk().sharpe_ratio, summary.sharpe_ratio);
    }

    #[test]
    fn test_display_rows() {
        let closes: Vec<f64> = (0..60).map(|i| 20.0 + i as f64 * 0.5).collect();
        let summary = summarize(&IndicatorEngine::default().augment(&series(&closes))).unwrap();
        let rows = summary.display_rows();
        let labels: Vec<_> = rows.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels[0], "Symbol");
        assert_eq!(labels[10..], ["SMA_20", "SMA_50", "SMA_200"]);
        assert_eq!(rows[1].1, "$49.50");
        assert_eq!(rows[4].1, "1,030");
        assert_eq!(rows[12].1, "n/a");
        assert!(rows[5].1.ends_with('%'));

    }

    #[test]
    fn test_display_rows_follow_configured_periods() {
        let config = IndicatorConfig {
            sma: [Period::new_const(10), Period::new_const(30), Period::new_const(100)],
            ..Default::default()
        };
        let engine = IndicatorEngine::new(config).unwrap();
        let closes: Vec<f64> = (0..60).map(|i| 20.0 + i as f64 * 0.5).collect();
        let summary = summarize(&engine.augment(&series(&closes))).unwrap();

        assert_eq!(summary.sma_periods, [10, 30, 100]);
        let rows = summary.display_rows();
        let labels: Vec<_> = rows.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels[10..], ["SMA_10", "SMA_30", "SMA_100"]);
        assert_eq!(rows[11].1, "$42.25");
        assert_eq!(rows[12].1, "n/a");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.4), "999");
        assert_eq!(thousands(1234567.6), "1,234,568");
        assert_eq!(thousands(-4500.0), "-4,500");
        assert_eq!(percent(0.1234), "12.34%");
    }
}
