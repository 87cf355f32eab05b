//! Indicator engine
//!
//! Derives the indicator columns for a [`Series`] without touching its bars.
//!
//! # Indicator Set (defaults)
//!
//! - **Trend**: SMA(20/50/200), EMA(20/50), MACD(12, 26, 9)
//! - **Momentum**: RSI(14), Stochastic(14, 3)
//! - **Volatility**: Bollinger(20, 2)
//!
//! Columns are `None` for the warm-up prefix each indicator needs; short series
//! produce all-`None` columns rather than errors.

pub mod momentum;
pub mod trend;
pub mod volatility;

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{Bar, Series};
use crate::{AnalysisError, Period, Result};

pub use momentum::{rsi, stochastic, StochasticOutput};
pub use trend::{ema, ema_sparse, macd, sma, sma_sparse, MacdOutput};
pub use volatility::{bollinger, rolling_std, BollingerOutput};

// ============================================================
// COLUMNS
// ============================================================

/// Generates the columnar [`Indicators`] table and its per-bar [`IndicatorSet`] row.
macro_rules! define_indicator_columns {
    (
        $(
            $(#[$doc:meta])*
            $field:ident
        ),* $(,)?
    ) => {
        /// Indicator columns aligned to the bars of one series
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        pub struct Indicators {
            $($(#[$doc])* pub $field: Vec<Option<f64>>,)*
        }

        /// Indicator values at a single bar
        #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
        pub struct IndicatorSet {
            $($(#[$doc])* pub $field: Option<f64>,)*
        }

        impl Indicators {
            /// Row view at `index`; all `None` past the end.
            pub fn at(&self, index: usize) -> IndicatorSet {
                IndicatorSet {
                    $($field: self.$field.get(index).copied().flatten(),)*
                }
            }

            /// Column names paired with their values.
            pub fn columns(&self) -> Vec<(&'static str, &[Option<f64>])> {
                vec![$((stringify!($field), self.$field.as_slice())),*]
            }

            fn slice(&self, range: Range<usize>) -> Self {
                Self {
                    $($field: self.$field[range.clone()].to_vec(),)*
                }
            }
        }
    };
}

define_indicator_columns! {
    /// SMA over the short period (default 20)
    sma_short,
    /// SMA over the medium period (default 50)
    sma_mid,
    /// SMA over the long period (default 200)
    sma_long,
    /// EMA over the short period (default 20)
    ema_short,
    /// EMA over the long period (default 50)
    ema_long,
    macd,
    macd_signal,
    macd_hist,
    rsi,
    bb_upper,
    bb_middle,
    bb_lower,
    stoch_k,
    stoch_d,
}

impl Indicators {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.sma_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sma_short.is_empty()
    }
}

// ============================================================
// CONFIG
// ============================================================

/// MACD periods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacdParams {
    pub fast: Period,
    pub slow: Period,
    pub signal: Period,
}

/// Bollinger period and band width in standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BollingerParams {
    pub period: Period,
    pub std_dev: f64,
}

/// Stochastic look-back and %D smoothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StochasticParams {
    pub period: Period,
    pub smooth: Period,
}

/// Periods for every indicator column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    /// Short, medium, long SMA
    pub sma: [Period; 3],
    /// Short, long EMA
    pub ema: [Period; 2],
    pub macd: MacdParams,
    pub rsi: Period,
    pub bollinger: BollingerParams,
    pub stochastic: StochasticParams,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma: [
                Period::new_const(20),
                Period::new_const(50),
                Period::new_const(200),
            ],
            ema: [Period::new_const(20), Period::new_const(50)],
            macd: MacdParams {
                fast: Period::new_const(12),
                slow: Period::new_const(26),
                signal: Period::new_const(9),
            },
            rsi: Period::new_const(14),
            bollinger: BollingerParams {
                period: Period::new_const(20),
                std_dev: 2.0,
            },
            stochastic: StochasticParams {
                period: Period::new_const(14),
                smooth: Period::new_const(3),
            },
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.macd.fast >= self.macd.slow {
            return Err(AnalysisError::InvalidConfig(format!(
                "MACD fast period {} must be shorter than slow period {}",
                self.macd.fast.get(),
                self.macd.slow.get()
            )));
        }
        let k = self.bollinger.std_dev;
        if !k.is_finite() || k <= 0.0 {
            return Err(AnalysisError::OutOfRange {
                field: "bollinger.std_dev",
                value: k,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        Ok(())
    }
}

// ============================================================
// AUGMENTED SERIES
// ============================================================

/// A series together with its indicator columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentedSeries {
    symbol: String,
    bars: Vec<Bar>,
    indicators: Indicators,
    /// Short, medium, long SMA periods behind the `sma_*` columns
    sma_periods: [usize; 3],
}

impl AugmentedSeries {
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }

    #[inline]
    pub fn sma_periods(&self) -> [usize; 3] {
        self.sma_periods
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Indicator row at `index`
    #[inline]
    pub fn at(&self, index: usize) -> IndicatorSet {
        self.indicators.at(index)
    }

    /// Restrict bars and indicator columns to an inclusive date range.
    /// Indicator values keep the warm-up of the full history.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let lo = start.map_or(0, |s| self.bars.partition_point(|b| b.date < s));
        let hi = end.map_or(self.bars.len(), |e| self.bars.partition_point(|b| b.date <= e));
        let range = lo..hi.max(lo);

        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[range.clone()].to_vec(),
            indicators: self.indicators.slice(range),
            sma_periods: self.sma_periods,
        }
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Computes indicator columns for a series
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Compute indicator columns for `series`.
    pub fn compute(&self, series: &Series) -> Indicators {
        let cfg = &self.config;
        let bars = series.bars();
        let closes = series.closes();

        let macd = macd(
            &closes,
            cfg.macd.fast.get(),
            cfg.macd.slow.get(),
            cfg.macd.signal.get(),
        );
        let bands = bollinger(&closes, cfg.bollinger.period.get(), cfg.bollinger.std_dev);
        let stoch = stochastic(bars, cfg.stochastic.period.get(), cfg.stochastic.smooth.get());

        Indicators {
            sma_short: sma(&closes, cfg.sma[0].get()),
            sma_mid: sma(&closes, cfg.sma[1].get()),
            sma_long: sma(&closes, cfg.sma[2].get()),
            ema_short: ema(&closes, cfg.ema[0].get()),
            ema_long: ema(&closes, cfg.ema[1].get()),
            macd: macd.line,
            macd_signal: macd.signal,
            macd_hist: macd.histogram,
            rsi: rsi(&closes, cfg.rsi.get()),
            bb_upper: bands.upper,
            bb_middle: bands.middle,
            bb_lower: bands.lower,
            stoch_k: stoch.k,
            stoch_d: stoch.d,
        }
    }

    /// Copy of `series` with every indicator column populated.
    pub fn augment(&self, series: &Series) -> AugmentedSeries {
        let indicators = self.compute(series);
        log::debug!(
            "{}: computed {} indicator columns over {} bars",
            series.symbol(),
            indicators.columns().len(),
            series.len()
        );
        AugmentedSeries {
            symbol: series.symbol().to_string(),
            bars: series.bars().to_vec(),
            indicators,
            sma_periods: self.config.sma.map(Period::get),
        }
    }
}

// ============================================================
// TESTS
// ============================================================
