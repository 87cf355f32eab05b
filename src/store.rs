//! Time-series store: per-symbol daily bars loaded once from a delimited file.
//!
//! Column headers are matched case-insensitively through a synonym table
//! (`ticker` -> symbol, `timestamp` -> date, ...). Every row is validated against
//! the bar invariant before it is accepted; each symbol's bars are stably sorted
//! by date and duplicate dates are resolved by a [`DuplicatePolicy`].
//!
//! The store is immutable after construction. Callers borrow [`Series`] from it
//! and compute derived data elsewhere.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, OHLCVExt, Result, OHLCV};

// ============================================================
// BAR / SERIES
// ============================================================

/// One trading day for one symbol. The symbol lives on the owning [`Series`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume as f64
    }
}

/// Date-ordered bars for exactly one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    symbol: String,
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series, stably sorting the bars by date.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

// ============================================================
// DUPLICATE POLICY
// ============================================================

/// How repeated (symbol, date) rows are resolved after sorting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep every row; duplicates stay adjacent in file order.
    KeepAll,
    KeepFirst,
    #[default]
    KeepLast,
}

impl DuplicatePolicy {
    /// Apply to date-sorted bars. Returns the number of rows dropped.
    fn apply(self, bars: &mut Vec<Bar>) -> usize {
        let before = bars.len();
        match self {
            DuplicatePolicy::KeepAll => {}
            DuplicatePolicy::KeepFirst => bars.dedup_by_key(|b| b.date),
            DuplicatePolicy::KeepLast => {
                bars.reverse();
                bars.dedup_by_key(|b| b.date);
                bars.reverse();
            }
        }
        before - bars.len()
    }
}

// ============================================================
// COLUMN MAPPING
// ============================================================

/// Canonical field -> accepted (lowercase) header names, in priority order
const COLUMN_SYNONYMS: [(&str, &[&str]); 7] = [
    ("date", &["date", "timestamp", "datetime"]),
    ("symbol", &["symbol", "ticker", "name"]),
    ("open", &["open"]),
    ("high", &["high"]),
    ("low", &["low"]),
    ("close", &["close"]),
    ("volume", &["volume"]),
];

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    symbol: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        let mut found = [None; 7];
        let mut missing = Vec::new();
        for (slot, (field, synonyms)) in COLUMN_SYNONYMS.iter().enumerate() {
            found[slot] = synonyms
                .iter()
                .find_map(|syn| lower.iter().position(|h| h == syn));
            if found[slot].is_none() {
                missing.push(*field);
            }
        }
        if !missing.is_empty() {
            return Err(AnalysisError::MissingColumns { missing });
        }

        let [date, symbol, open, high, low, close, volume] = found.map(|f| f.unwrap_or_default());
        Ok(Self {
            date,
            symbol,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

// ============================================================
// FIELD PARSING
// ============================================================

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a calendar date, discarding any time-of-day component.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn parse_price(s: &str, field: &str, row: usize) -> Result<f64> {
    s.trim().parse::<f64>().map_err(|_| AnalysisError::DataFormat {
        row,
        reason: format!("invalid {field} value {s:?}"),
    })
}

/// 2^64, the first float past the `u64` range
const VOLUME_LIMIT: f64 = u64::MAX as f64;

fn parse_volume(s: &str, row: usize) -> Result<u64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if (0.0..VOLUME_LIMIT).contains(&v) && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(AnalysisError::DataFormat {
            row,
            reason: format!("volume must be a non-negative integer, got {s:?}"),
        }),
    }
}

// ============================================================
// STORE
// ============================================================

/// Immutable in-memory table of per-symbol daily bars
#[derive(Debug, Clone, Default)]
pub struct Store {
    series: BTreeMap<String, Series>,
    duplicates_dropped: usize,
}

impl Store {
    /// Load a store from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P, policy: DuplicatePolicy) -> Result<Self> {
        let path = path.as_ref();
        log::info!("loading bars from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, policy)
    }

    /// Load a store from any CSV byte source.
    pub fn from_reader<R: Read>(reader: R, policy: DuplicatePolicy) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = ColumnMap::resolve(reader.headers()?)?;
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        let mut rows = 0usize;

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let symbol = field(columns.symbol);
            if symbol.is_empty() {
                return Err(AnalysisError::DataFormat {
                    row,
                    reason: "empty symbol".to_string(),
                });
            }
            let date = parse_date(field(columns.date)).ok_or_else(|| AnalysisError::DataFormat {
                row,
                reason: format!("invalid date {:?}", field(columns.date)),
            })?;

            let bar = Bar {
                date,
                open: parse_price(field(columns.open), "open", row)?,
                high: parse_price(field(columns.high), "high", row)?,
                low: parse_price(field(columns.low), "low", row)?,
                close: parse_price(field(columns.close), "close", row)?,
                volume: parse_volume(field(columns.volume), row)?,
            };
            bar.validate().map_err(|reason| AnalysisError::DataFormat {
                row,
                reason: reason.to_string(),
            })?;

            grouped.entry(symbol.to_string()).or_default().push(bar);
            rows += 1;
        }

        let store = Self::build(grouped, policy);
        log::info!(
            "loaded {} rows for {} symbols ({} duplicate dates dropped)",
            rows,
            store.series.len(),
            store.duplicates_dropped
        );
        Ok(store)
    }

    /// Build a store from already constructed series. Series sharing a symbol
    /// are merged. Bars are validated like CSV rows; `row` in the error is the
    /// bar's 1-based position within its series.
    pub fn from_series(
        series: impl IntoIterator<Item = Series>,
        policy: DuplicatePolicy,
    ) -> Result<Self> {
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for s in series {
            for (i, bar) in s.bars.iter().enumerate() {
                bar.validate().map_err(|reason| AnalysisError::DataFormat {
                    row: i + 1,
                    reason: format!("{}: {reason}", s.symbol),
                })?;
            }
            grouped.entry(s.symbol).or_default().extend(s.bars);
        }
        Ok(Self::build(grouped, policy))
    }

    fn build(grouped: BTreeMap<String, Vec<Bar>>, policy: DuplicatePolicy) -> Self {
        let mut duplicates_dropped = 0;
        let series = grouped
            .into_iter()
            .map(|(symbol, bars)| {
                let mut series = Series::new(symbol.clone(), bars);
                let dropped = policy.apply(&mut series.bars);
                if dropped > 0 {
                    log::warn!("{symbol}: dropped {dropped} rows with duplicate dates ({policy:?})");
                }
                duplicates_dropped += dropped;
                (symbol, series)
            })
            .collect();

        Self {
            series,
            duplicates_dropped,
        }
    }

    /// All bars for one symbol.
    pub fn slice(&self, symbol: &str) -> Result<&Series> {
        self.series
            .get(symbol)
            .ok_or_else(|| AnalysisError::SymbolNotFound(symbol.to_string()))
    }

    /// Symbol names in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Iterate every series in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.values()
    }

    /// Total number of bars across all symbols.
    pub fn len(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }
}

// ============================================================
// TESTS
// ============================================================
