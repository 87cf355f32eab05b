//! Window pattern detector
//!
//! Slides a fixed-size trailing window over an [`AugmentedSeries`] and classifies
//! each position into zero or more named patterns. For bar `i` the window covers
//! bars `[i - window, i)`; indicator checks read the window's last bar (`i - 1`)
//! and the band check compares the close of bar `i` itself. Events are dated
//! with bar `i`.
//!
//! Rules are grouped. Each group emits at most one event per bar:
//!
//! | Group | Patterns | Confidence |
//! |-------|----------|------------|
//! | Trend | Strong Uptrend, Strong Downtrend, else Consolidation | High / High / Medium |
//! | Crossover | Golden Cross, Death Cross | High |
//! | Momentum | Overbought, Oversold | Medium |
//! | Band | Above Upper Band, Below Lower Band | Medium |
//!
//! Groups are independent of each other, so one date can carry up to four events.
//! Within a group the first rule to match wins, builtin rules before custom ones.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::indicators::{AugmentedSeries, IndicatorConfig, IndicatorSet};
use crate::params::{check_known, get_ratio, get_value, ParamMeta, ParameterizedRule};
use crate::store::Bar;
use crate::{AnalysisError, Period, Ratio, Result};

/// Default trailing window length in bars
pub const DEFAULT_WINDOW: usize = 20;

// ============================================================
// PATTERN KINDS
// ============================================================

/// Confidence attached to a pattern kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        };
        f.pad(s)
    }
}

/// Mutually exclusive family a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PatternGroup {
    Trend,
    Crossover,
    Momentum,
    Band,
}

/// Named pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    StrongUptrend,
    StrongDowntrend,
    Consolidation,
    GoldenCross,
    DeathCross,
    Overbought,
    Oversold,
    AboveUpperBand,
    BelowLowerBand,
}

impl PatternKind {
    pub const ALL: [PatternKind; 9] = [
        PatternKind::StrongUptrend,
        PatternKind::StrongDowntrend,
        PatternKind::Consolidation,
        PatternKind::GoldenCross,
        PatternKind::DeathCross,
        PatternKind::Overbought,
        PatternKind::Oversold,
        PatternKind::AboveUpperBand,
        PatternKind::BelowLowerBand,
    ];

    /// Display name (e.g. "Golden Cross")
    pub fn name(self) -> &'static str {
        match self {
            PatternKind::StrongUptrend => "Strong Uptrend",
            PatternKind::StrongDowntrend => "Strong Downtrend",
            PatternKind::Consolidation => "Consolidation",
            PatternKind::GoldenCross => "Golden Cross",
            PatternKind::DeathCross => "Death Cross",
            PatternKind::Overbought => "Overbought",
            PatternKind::Oversold => "Oversold",
            PatternKind::AboveUpperBand => "Above Upper Band",
            PatternKind::BelowLowerBand => "Below Lower Band",
        }
    }

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn confidence(self) -> Confidence {
        match self {
            PatternKind::StrongUptrend
            | PatternKind::StrongDowntrend
            | PatternKind::GoldenCross
            | PatternKind::DeathCross => Confidence::High,
            PatternKind::Consolidation
            | PatternKind::Overbought
            | PatternKind::Oversold
            | PatternKind::AboveUpperBand
            | PatternKind::BelowLowerBand => Confidence::Medium,
        }
    }

    /// Event text under the default SMA periods and RSI thresholds
    pub fn description(self) -> &'static str {
        match self {
            PatternKind::StrongUptrend => "Consistent upward price movement",
            PatternKind::StrongDowntrend => "Consistent downward price movement",
            PatternKind::Consolidation => "Price moving sideways in a tight range",
            PatternKind::GoldenCross => "50-day SMA crosses above 200-day SMA",
            PatternKind::DeathCross => "50-day SMA crosses below 200-day SMA",
            PatternKind::Overbought => "RSI above 70 indicates potential overbought condition",
            PatternKind::Oversold => "RSI below 30 indicates potential oversold condition",
            PatternKind::AboveUpperBand => "Price above upper Bollinger Band",
            PatternKind::BelowLowerBand => "Price below lower Bollinger Band",
        }
    }

    pub fn group(self) -> PatternGroup {
        match self {
            PatternKind::StrongUptrend | PatternKind::StrongDowntrend | PatternKind::Consolidation => {
                PatternGroup::Trend
            }
            PatternKind::GoldenCross | PatternKind::DeathCross => PatternGroup::Crossover,
            PatternKind::Overbought | PatternKind::Oversold => PatternGroup::Momentum,
            PatternKind::AboveUpperBand | PatternKind::BelowLowerBand => PatternGroup::Band,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl Serialize for PatternKind {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

/// A detected pattern. The description only allocates when it names
/// non-default periods or thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternEvent {
    pub date: NaiveDate,
    /// Bar index the event is dated with
    pub index: usize,
    pub kind: PatternKind,
    pub confidence: Confidence,
    pub description: Cow<'static, str>,
}

impl PatternEvent {
    fn new(kind: PatternKind, index: usize, date: NaiveDate, description: Cow<'static, str>) -> Self {
        Self {
            date,
            index,
            kind,
            confidence: kind.confidence(),
            description,
        }
    }
}

// ============================================================
// WINDOW
// ============================================================

/// Trailing window `[start, end)` plus the bar at `end` it is evaluated for
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    series: &'a AugmentedSeries,
    start: usize,
    end: usize,
}

impl<'a> Window<'a> {
    /// Window of `len` bars ending just before bar `end`. `None` if it does not
    /// fit inside the series.
    pub fn new(series: &'a AugmentedSeries, end: usize, len: usize) -> Option<Self> {
        (len > 0 && end >= len && end < series.len()).then(|| Self {
            series,
            start: end - len,
            end,
        })
    }

    #[inline]
    pub fn series(&self) -> &'a AugmentedSeries {
        self.series
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Index of the bar being evaluated (one past the window).
    #[inline]
    pub fn current(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Bars inside the window
    #[inline]
    pub fn bars(&self) -> &'a [Bar] {
        &self.series.bars()[self.start..self.end]
    }

    #[inline]
    pub fn current_bar(&self) -> &'a Bar {
        &self.series.bars()[self.end]
    }

    /// Indicators at the window's last bar
    #[inline]
    pub fn last(&self) -> IndicatorSet {
        self.series.at(self.end - 1)
    }

    /// Indicators at the window's second-to-last bar
    #[inline]
    pub fn previous(&self) -> Option<IndicatorSet> {
        (self.len() >= 2).then(|| self.series.at(self.end - 2))
    }
}

// ============================================================
// RULE TRAIT
// ============================================================

/// One exclusive group of window checks. Returns at most one pattern per window.
pub trait WindowRule: Send + Sync {
    fn group(&self) -> PatternGroup;

    fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind>;

    /// Event text for a kind this rule matched on `window`
    fn describe(&self, kind: PatternKind, _window: &Window<'_>) -> Cow<'static, str> {
        Cow::Borrowed(kind.description())
    }

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Generate `with_defaults()` -> `Self::default()` for multiple rule types.
macro_rules! impl_with_defaults {
    ($($rule:ty),* $(,)?) => {
        $(impl $rule {
            pub fn with_defaults() -> Self { Self::default() }
        })*
    };
}

impl_with_defaults!(TrendRule, CrossoverRule, MomentumRule, BandRule);

// ============================================================
// TREND
// ============================================================

/// Strong Uptrend / Strong Downtrend, otherwise Consolidation
#[derive(Debug, Clone, Copy)]
pub struct TrendRule {
    /// Consolidation when close std-dev < mean close * this
    pub max_std_ratio: Ratio,
}

impl Default for TrendRule {
    fn default() -> Self {
        Self {
            max_std_ratio: Ratio::new_const(0.02),
        }
    }
}

static TREND_PARAMS: [ParamMeta; 1] = [ParamMeta::ratio(
    "max_std_ratio",
    0.02,
    (0.0, 1.0),
    "Consolidation threshold: close std-dev as a fraction of mean close",
)];

impl ParameterizedRule for TrendRule {
    fn rule_name() -> &'static str {
        "trend"
    }

    fn param_meta() -> &'static [ParamMeta] {
        &TREND_PARAMS
    }

    fn with_params(params: &HashMap<String, f64>) -> Result<Self> {
        check_known(Self::rule_name(), &TREND_PARAMS, params)?;
        Ok(Self {
            max_std_ratio: get_ratio(params, &TREND_PARAMS[0])?,
        })
    }
}

impl WindowRule for TrendRule {
    fn group(&self) -> PatternGroup {
        PatternGroup::Trend
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind> {
        let bars = window.bars();

        if bars.windows(2).all(|w| w[1].close > w[0].close) {
            return Some(PatternKind::StrongUptrend);
        }
        if bars.windows(2).all(|w| w[1].close < w[0].close) {
            return Some(PatternKind::StrongDowntrend);
        }

        // sample std-dev needs two points
        let n = bars.len();
        if n < 2 {
            return None;
        }
        let mean = bars.iter().map(|b| b.close).sum::<f64>() / n as f64;
        let var = bars.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        (var.sqrt() < mean * self.max_std_ratio.get()).then_some(PatternKind::Consolidation)
    }
}

// ============================================================
// CROSSOVER
// ============================================================

/// Golden / Death cross of the medium SMA over the long SMA between the
/// window's last two bars
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossoverRule;

impl WindowRule for CrossoverRule {
    fn group(&self) -> PatternGroup {
        PatternGroup::Crossover
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind> {
        let prev = window.previous()?;
        let last = window.last();
        let (prev_mid, prev_long) = (prev.sma_mid?, prev.sma_long?);
        let (last_mid, last_long) = (last.sma_mid?, last.sma_long?);

        if prev_mid <= prev_long && last_mid > last_long {
            Some(PatternKind::GoldenCross)
        } else if prev_mid >= prev_long && last_mid < last_long {
            Some(PatternKind::DeathCross)
        } else {
            None
        }
    }

    fn describe(&self, kind: PatternKind, window: &Window<'_>) -> Cow<'static, str> {
        let [_, mid, long] = window.series().sma_periods();
        let [_, default_mid, default_long] = IndicatorConfig::default().sma.map(Period::get);
        if (mid, long) == (default_mid, default_long) {
            return Cow::Borrowed(kind.description());
        }
        let direction = if kind == PatternKind::DeathCross { "below" } else { "above" };
        Cow::Owned(format!("{mid}-day SMA crosses {direction} {long}-day SMA"))
    }
}

// ============================================================
// MOMENTUM
// ============================================================

/// RSI extremes at the window's last bar
#[derive(Debug, Clone, Copy)]
pub struct MomentumRule {
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for MomentumRule {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

static MOMENTUM_PARAMS: [ParamMeta; 2] = [
    ParamMeta::level("overbought", 70.0, (50.0, 100.0), "RSI above this is overbought"),
    ParamMeta::level("oversold", 30.0, (0.0, 50.0), "RSI below this is oversold"),
];

impl ParameterizedRule for MomentumRule {
    fn rule_name() -> &'static str {
        "momentum"
    }

    fn param_meta() -> &'static [ParamMeta] {
        &MOMENTUM_PARAMS
    }

    fn with_params(params: &HashMap<String, f64>) -> Result<Self> {
        check_known(Self::rule_name(), &MOMENTUM_PARAMS, params)?;
        let rule = Self {
            overbought: get_value(params, &MOMENTUM_PARAMS[0])?,
            oversold: get_value(params, &MOMENTUM_PARAMS[1])?,
        };
        rule.validate_config()?;
        Ok(rule)
    }
}

impl WindowRule for MomentumRule {
    fn group(&self) -> PatternGroup {
        PatternGroup::Momentum
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind> {
        let rsi = window.last().rsi?;
        if rsi > self.overbought {
            Some(PatternKind::Overbought)
        } else if rsi < self.oversold {
            Some(PatternKind::Oversold)
        } else {
            None
        }
    }

    fn describe(&self, kind: PatternKind, _window: &Window<'_>) -> Cow<'static, str> {
        let defaults = Self::default();
        match kind {
            PatternKind::Overbought if self.overbought != defaults.overbought => Cow::Owned(format!(
                "RSI above {} indicates potential overbought condition",
                self.overbought
            )),
            PatternKind::Oversold if self.oversold != defaults.oversold => Cow::Owned(format!(
                "RSI below {} indicates potential oversold condition",
                self.oversold
            )),
            _ => Cow::Borrowed(kind.description()),
        }
    }

    fn validate_config(&self) -> Result<()> {
        if self.oversold >= self.overbought {
            return Err(AnalysisError::InvalidConfig(format!(
                "oversold level {} must be below overbought level {}",
                self.oversold, self.overbought
            )));
        }
        Ok(())
    }
}

// ============================================================
// BAND
// ============================================================

/// Current close outside the Bollinger bands of the window's last bar
#[derive(Debug, Clone, Copy, Default)]
pub struct BandRule;

impl WindowRule for BandRule {
    fn group(&self) -> PatternGroup {
        PatternGroup::Band
    }

    fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind> {
        let close = window.current_bar().close;
        let last = window.last();

        if last.bb_upper.is_some_and(|upper| close > upper) {
            Some(PatternKind::AboveUpperBand)
        } else if last.bb_lower.is_some_and(|lower| close < lower) {
            Some(PatternKind::BelowLowerBand)
        } else {
            None
        }
    }
}

// ============================================================
// BUILTIN RULES - generated via macro
// ============================================================

/// Macro to generate BuiltinRule enum without boilerplate
macro_rules! define_builtin_rules {
    (
        $(
            $variant:ident($rule:ty)
        ),* $(,)?
    ) => {
        /// All builtin rules - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinRule {
            $($variant($rule)),*
        }

        impl WindowRule for BuiltinRule {
            #[inline]
            fn group(&self) -> PatternGroup {
                match self {
                    $(Self::$variant(r) => WindowRule::group(r)),*
                }
            }

            #[inline]
            fn evaluate(&self, window: &Window<'_>) -> Option<PatternKind> {
                match self {
                    $(Self::$variant(r) => WindowRule::evaluate(r, window)),*
                }
            }

            fn describe(&self, kind: PatternKind, window: &Window<'_>) -> Cow<'static, str> {
                match self {
                    $(Self::$variant(r) => WindowRule::describe(r, kind, window)),*
                }
            }

            fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(r) => WindowRule::validate_config(r)),*
                }
            }
        }
    };
}

define_builtin_rules! {
    Trend(TrendRule),
    Crossover(CrossoverRule),
    Momentum(MomentumRule),
    Band(BandRule),
}

// ============================================================
// DETECTOR
// ============================================================

/// Patterns found for one scanned bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowPatterns {
    pub index: usize,
    pub date: NaiveDate,
    pub events: Vec<PatternEvent>,
}

/// Sliding-window pattern detector
pub struct PatternDetector {
    window: Period,
    builtin: Vec<BuiltinRule>,
    custom: Vec<Box<dyn WindowRule>>,
    kind_filter: Option<Vec<PatternKind>>,
}

impl PatternDetector {
    /// Window length in bars
    #[inline]
    pub fn window(&self) -> usize {
        self.window.get()
    }

    /// Events for bar `index`, at most one per group. Empty when `index` is
    /// outside `window..len`.
    pub fn evaluate_at(&self, series: &AugmentedSeries, index: usize) -> Vec<PatternEvent> {
        let Some(window) = Window::new(series, index, self.window()) else {
            return Vec::new();
        };
        let date = series.bars()[index].date;

        let rules = self
            .builtin
            .iter()
            .map(|r| r as &dyn WindowRule)
            .chain(self.custom.iter().map(|r| &**r as &dyn WindowRule));

        let mut matched: Vec<PatternGroup> = Vec::with_capacity(4);
        let mut events = Vec::new();
        for rule in rules {
            let group = rule.group();
            if matched.contains(&group) {
                continue;
            }
            let Some(kind) = rule.evaluate(&window) else {
                continue;
            };
            matched.push(group);
            if self.should_include(kind) {
                events.push(PatternEvent::new(kind, index, date, rule.describe(kind, &window)));
            }
        }
        events
    }

    /// Lazy per-bar scan. Restart by calling again or cloning the iterator.
    pub fn iter<'a>(&'a self, series: &'a AugmentedSeries) -> PatternIter<'a> {
        PatternIter {
            detector: self,
            series,
            current: self.window(),
        }
    }

    /// Lazy flat sequence of events in date order.
    pub fn events<'a>(
        &'a self,
        series: &'a AugmentedSeries,
    ) -> impl Iterator<Item = PatternEvent> + Clone + 'a {
        self.iter(series).flat_map(|w| w.events)
    }

    /// All events. A series no longer than the window yields none.
    pub fn scan(&self, series: &AugmentedSeries) -> Vec<PatternEvent> {
        self.events(series).collect()
    }

    /// Like [`scan`](Self::scan) but fails when the series is shorter than the window.
    pub fn scan_strict(&self, series: &AugmentedSeries) -> Result<Vec<PatternEvent>> {
        if series.len() < self.window() {
            return Err(AnalysisError::InsufficientHistory {
                need: self.window(),
                got: series.len(),
            });
        }
        Ok(self.scan(series))
    }

    /// Events grouped by scanned bar, including bars with no events.
    pub fn scan_grouped(&self, series: &AugmentedSeries) -> Vec<WindowPatterns> {
        self.iter(series).collect()
    }

    fn should_include(&self, kind: PatternKind) -> bool {
        self.kind_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&kind))
    }

    fn validate(&self) -> Result<()> {
        for r in &self.builtin {
            r.validate_config()?;
        }
        for r in &self.custom {
            r.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Iterator over scanned bars with their patterns
#[derive(Clone)]
pub struct PatternIter<'a> {
    detector: &'a PatternDetector,
    series: &'a AugmentedSeries,
    current: usize,
}

impl Iterator for PatternIter<'_> {
    type Item = WindowPatterns;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.series.len() {
            return None;
        }

        let index = self.current;
        let events = self.detector.evaluate_at(self.series, index);
        self.current += 1;

        Some(WindowPatterns {
            index,
            date: self.series.bars()[index].date,
            events,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.series.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PatternIter<'_> {}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`PatternDetector`]
pub struct DetectorBuilder {
    window: usize,
    builtin: Vec<BuiltinRule>,
    custom: Vec<Box<dyn WindowRule>>,
    kind_filter: Option<Vec<PatternKind>>,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBuilder {
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            builtin: Vec::new(),
            custom: Vec::new(),
            kind_filter: None,
        }
    }

    /// Trailing window length in bars
    pub fn window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Add the four builtin groups in order: trend, crossover, momentum, band
    pub fn with_all_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinRule::Trend(TrendRule::with_defaults()),
            BuiltinRule::Crossover(CrossoverRule::with_defaults()),
            BuiltinRule::Momentum(MomentumRule::with_defaults()),
            BuiltinRule::Band(BandRule::with_defaults()),
        ]);
        self
    }

    /// Add the builtin groups with named threshold overrides, keyed by rule
    /// name (`"trend"`, `"momentum"`). Rules without an entry use defaults.
    pub fn with_params(mut self, rules: &HashMap<String, HashMap<String, f64>>) -> Result<Self> {
        const TUNABLE: [&str; 2] = ["trend", "momentum"];
        if let Some(unknown) = rules.keys().find(|k| !TUNABLE.contains(&k.as_str())) {
            return Err(AnalysisError::InvalidConfig(format!(
                "unknown rule section {unknown:?} (expected one of {TUNABLE:?})"
            )));
        }
        let section = |name: &str| rules.get(name).cloned().unwrap_or_default();

        self.builtin.extend([
            BuiltinRule::Trend(TrendRule::with_params(&section(TrendRule::rule_name()))?),
            BuiltinRule::Crossover(CrossoverRule),
            BuiltinRule::Momentum(MomentumRule::with_params(&section(MomentumRule::rule_name()))?),
            BuiltinRule::Band(BandRule),
        ]);
        Ok(self)
    }

    /// Add a builtin rule
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, rule: BuiltinRule) -> Self {
        self.builtin.push(rule);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, rule: BuiltinRule) -> Result<Self> {
        rule.validate_config()?;
        self.builtin.push(rule);
        Ok(self)
    }

    /// Add a custom rule (evaluated after builtin rules)
    pub fn add_custom<R: WindowRule + 'static>(mut self, rule: R) -> Self {
        self.custom.push(Box::new(rule));
        self
    }

    /// Emit only the listed kinds
    pub fn only_kinds(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.kind_filter = Some(kinds.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<PatternDetector> {
        let detector = PatternDetector {
            window: Period::new(self.window)?,
            builtin: self.builtin,
            custom: self.custom,
            kind_filter: self.kind_filter,
        };
        detector.validate()?;
        Ok(detector)
    }
}

// ============================================================
// TESTS
// ============================================================
