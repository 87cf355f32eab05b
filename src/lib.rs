//! # stockscan - daily OHLCV analytics
//!
//! Loads historical daily bars from a delimited file, computes a fixed set of
//! technical indicators, scans the series with a sliding window for named
//! chart patterns and derives risk/return summary statistics.
//!
//! ## Quick Start
//!
//! ```rust
//! use stockscan::prelude::*;
//!
//! let csv = "date,ticker,open,high,low,close,volume\n\
//!            2024-01-02,ACME,10.0,10.5,9.5,10.2,1000\n\
//!            2024-01-03,ACME,10.2,10.8,10.1,10.6,1200\n";
//! let store = Store::from_reader(csv.as_bytes(), DuplicatePolicy::KeepLast).unwrap();
//!
//! let series = store.slice("ACME").unwrap();
//! let augmented = IndicatorEngine::default().augment(series);
//!
//! let detector = DetectorBuilder::new().with_all_defaults().build().unwrap();
//! let events = detector.scan(&augmented);
//! assert!(events.is_empty());
//!
//! let summary = summarize(&augmented).unwrap();
//! assert_eq!(summary.current_price, 10.6);
//! ```

pub mod analysis;
pub mod config;
pub mod indicators;
pub mod params;
pub mod patterns;
pub mod store;
pub mod summary;

pub mod prelude {
    pub use crate::{
        // Pipeline
        analysis::{AnalysisRequest, Analyzer, Report, SymbolFailure},
        // Configuration
        config::AnalysisConfig,
        // Indicators
        indicators::{AugmentedSeries, IndicatorConfig, IndicatorEngine, IndicatorSet, Indicators},
        // Parameters
        params::{ParamMeta, ParameterizedRule},
        // Patterns
        patterns::{
            BuiltinRule, Confidence, DetectorBuilder, PatternDetector, PatternEvent, PatternGroup,
            PatternKind, Window, WindowPatterns, WindowRule,
        },
        // Store
        store::{Bar, DuplicatePolicy, Series, Store},
        // Summary
        summary::{risk_metrics, summarize, RiskMetrics, Summary},
        // Errors
        AnalysisError,
        // Core traits
        OHLCVExt,
        Period,
        Ratio,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by loading, indicator, detection and summary stages
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Missing required columns: {missing:?}")]
    MissingColumns { missing: Vec<&'static str> },

    #[error("Malformed data at row {row}: {reason}")]
    DataFormat { row: usize, reason: String },

    #[error("No data found for symbol: {0}")]
    SymbolNotFound(String),

    #[error("Insufficient history: need {need} bars, got {got}")]
    InsufficientHistory { need: usize, got: usize },

    #[error("Empty series for symbol: {symbol}")]
    EmptySeries { symbol: String },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl AnalysisError {
    /// Routine "no data" conditions a caller should report and move past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::SymbolNotFound(_)
                | AnalysisError::InsufficientHistory { .. }
                | AnalysisError::EmptySeries { .. }
        )
    }

    /// Short sentence suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::SymbolNotFound(symbol) => {
                format!("No data found for symbol: {symbol}")
            }
            AnalysisError::EmptySeries { symbol } => {
                format!("No price history for {symbol} in the selected range")
            }
            AnalysisError::InsufficientHistory { need, got } => {
                format!("Not enough history for pattern detection ({got} of {need} bars)")
            }
            AnalysisError::MissingColumns { .. } | AnalysisError::DataFormat { .. } => {
                "The data file could not be read. Check its columns and values.".to_string()
            }
            _ => "The analysis could not be completed.".to_string(),
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(AnalysisError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Look-back length in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AnalysisError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn body_low(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_high(&self) -> f64 {
        self.open().max(self.close())
    }

    /// Validate `low <= min(open, close) <= max(open, close) <= high` with positive,
    /// finite prices and a non-negative volume.
    fn validate(&self) -> std::result::Result<(), &'static str> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err("non-finite price");
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err("price must be positive");
        }
        if self.range() < 0.0 {
            return Err("high < low");
        }
        if self.body_low() < self.low() {
            return Err("open/close below low");
        }
        if self.body_high() > self.high() {
            return Err("open/close above high");
        }
        if self.volume() < 0.0 {
            return Err("negative volume");
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.o
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }

        fn volume(&self) -> f64 {
            1000.0
        }
    }

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { o, h, l, c }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.02).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(200).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_period_deserialize_rejects_zero() {
        let ok: std::result::Result<Period, _> = serde_json::from_str("20");
        assert_eq!(ok.unwrap().get(), 20);
        let bad: std::result::Result<Period, _> = serde_json::from_str("0");
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_accepts_consistent_bar() {
        assert!(bar(100.0, 110.0, 90.0, 105.0).validate().is_ok());
        assert!(bar(100.0, 100.0, 100.0, 100.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_bars() {
        assert_eq!(bar(100.0, 90.0, 110.0, 100.0).validate(), Err("high < low"));
        assert_eq!(
            bar(89.0, 110.0, 90.0, 100.0).validate(),
            Err("open/close below low")
        );
        assert_eq!(
            bar(100.0, 110.0, 90.0, 111.0).validate(),
            Err("open/close above high")
        );
        assert_eq!(
            bar(0.0, 110.0, 0.0, 100.0).validate(),
            Err("price must be positive")
        );
        assert_eq!(
            bar(f64::NAN, 110.0, 90.0, 100.0).validate(),
            Err("non-finite price")
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(AnalysisError::SymbolNotFound("X".into()).is_recoverable());
        assert!(AnalysisError::EmptySeries { symbol: "X".into() }.is_recoverable());
        assert!(AnalysisError::InsufficientHistory { need: 20, got: 3 }.is_recoverable());
        assert!(!AnalysisError::MissingColumns { missing: vec!["date"] }.is_recoverable());
    }

    #[test]
    fn test_user_message_hides_internal_text() {
        let err = AnalysisError::DataFormat {
            row: 7,
            reason: "bad float literal".into(),
        };
        assert!(!err.user_message().contains("float"));
        assert_eq!(
            AnalysisError::SymbolNotFound("ZZZ".into()).user_message(),
            "No data found for symbol: ZZZ"
        );
    }
}
