//! Request pipeline
//!
//! One symbol request runs slice -> augment -> {detect, summarize} over the
//! symbol's full history, then cuts the chart series to the requested date
//! range. The store is borrowed immutably, so requests for different symbols
//! can run on any number of threads.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::indicators::{AugmentedSeries, IndicatorEngine};
use crate::patterns::{PatternDetector, PatternEvent};
use crate::store::Store;
use crate::summary::{summarize, Summary};
use crate::{AnalysisError, Result};

/// Symbol plus optional inclusive chart range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl AnalysisRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start: None,
            end: None,
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Everything a presentation layer needs for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    /// Most recent events, oldest first
    pub recent_events: Vec<PatternEvent>,
    pub total_events: usize,
    /// Augmented series restricted to the requested range
    pub chart: AugmentedSeries,
}

/// Error from analyzing a single symbol
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: AnalysisError,
}

/// Runs requests against a loaded store
pub struct Analyzer<'s> {
    store: &'s Store,
    engine: IndicatorEngine,
    detector: PatternDetector,
    recent_events: usize,
}

impl<'s> Analyzer<'s> {
    pub fn new(store: &'s Store, config: AnalysisConfig) -> Result<Self> {
        let engine = config.indicator_engine()?;
        let detector = config.detector()?;
        Ok(Self {
            store,
            engine,
            detector,
            recent_events: config.detector.recent_events,
        })
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<Report> {
        let series = self.store.slice(&request.symbol)?;
        let augmented = self.engine.augment(series);

        let events = self.detector.scan(&augmented);
        let summary = summarize(&augmented)?;

        let chart = augmented.between(request.start, request.end);
        if chart.is_empty() {
            return Err(AnalysisError::EmptySeries {
                symbol: request.symbol.clone(),
            });
        }

        log::debug!(
            "{}: {} bars, {} events, {} chart bars",
            request.symbol,
            augmented.len(),
            events.len(),
            chart.len()
        );

        let total_events = events.len();
        let recent_events = events[total_events.saturating_sub(self.recent_events)..].to_vec();

        Ok(Report {
            summary,
            recent_events,
            total_events,
            chart,
        })
    }

    /// Analyze every symbol in parallel over full history.
    pub fn analyze_all(&self) -> (Vec<Report>, Vec<SymbolFailure>) {
        let symbols: Vec<&str> = self.store.symbols().collect();

        let results: Vec<_> = symbols
            .into_par_iter()
            .map(|symbol| {
                self.analyze(&AnalysisRequest::new(symbol))
                    .map_err(|error| SymbolFailure {
                        symbol: symbol.to_string(),
                        error,
                    })
            })
            .collect();

        let mut reports = Vec::new();
        let mut failures = Vec::new();

        for result in results {
            match result {
                Ok(r) => reports.push(r),
                Err(e) => failures.push(e),
            }
        }

        (reports, failures)
    }
}
