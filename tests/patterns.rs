//! Integration tests for the window pattern detector.

use chrono::NaiveDate;
use stockscan::patterns::MomentumRule;
use stockscan::prelude::*;

fn series_from(closes: &[f64]) -> Series {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(start + chrono::Days::new(i as u64), c, c * 1.01, c * 0.99, c, 10_000)
        })
        .collect();
    Series::new("TEST", bars)
}

fn augment(closes: &[f64]) -> AugmentedSeries {
    IndicatorEngine::default().augment(&series_from(closes))
}

/// Engine with short SMAs so crossovers appear within a few bars
fn fast_sma_engine() -> IndicatorEngine {
    let config = IndicatorConfig {
        sma: [
            Period::new(2).unwrap(),
            Period::new(3).unwrap(),
            Period::new(5).unwrap(),
        ],
        ..Default::default()
    };
    IndicatorEngine::new(config).unwrap()
}

fn make_uptrend(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64 * 1.5).collect()
}

fn make_downtrend(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 - i as f64 * 1.5).collect()
}

fn default_detector() -> PatternDetector {
    DetectorBuilder::new().with_all_defaults().build().unwrap()
}

fn of_group(events: &[PatternEvent], group: PatternGroup) -> Vec<PatternKind> {
    events
        .iter()
        .filter(|e| e.kind.group() == group)
        .map(|e| e.kind)
        .collect()
}

// ============================================================
// TREND GROUP
// ============================================================

#[test]
fn test_uptrend_first_window() {
    let s = augment(&make_uptrend(25));
    let grouped = default_detector().scan_grouped(&s);

    assert_eq!(grouped.len(), 5);
    assert_eq!(grouped[0].index, 20);
    assert_eq!(grouped[0].date, s.bars()[20].date);
    assert_eq!(
        of_group(&grouped[0].events, PatternGroup::Trend),
        vec![PatternKind::StrongUptrend]
    );
    let event = &grouped[0].events[0];
    assert_eq!(event.confidence, Confidence::High);
    assert_eq!(event.description, "Consistent upward price movement");
}

#[test]
fn test_downtrend_with_oversold() {
    let s = augment(&make_downtrend(25));
    let events = default_detector().scan(&s);

    assert_eq!(
        of_group(&events, PatternGroup::Trend),
        vec![PatternKind::StrongDowntrend; 5]
    );
    assert_eq!(
        of_group(&events, PatternGroup::Momentum),
        vec![PatternKind::Oversold; 5]
    );
}

#[test]
fn test_flat_series_consolidates() {
    let s = augment(&[100.0; 30]);
    let events = default_detector().scan(&s);

    assert_eq!(events.len(), 10);
    assert!(events
        .iter()
        .all(|e| e.kind == PatternKind::Consolidation && e.confidence == Confidence::Medium));

    let summary = summarize(&s).unwrap();
    assert_eq!(summary.sharpe_ratio, 0.0);
}

#[test]
fn test_single_dip_breaks_trend() {
    let mut closes = make_uptrend(25);
    closes[15] = closes[14] - 0.5;
    let s = augment(&closes);
    let detector = default_detector();

    // window [0, 20) contains the dip
    let at_20 = detector.evaluate_at(&s, 20);
    assert!(of_group(&at_20, PatternGroup::Trend).is_empty());
}

// ============================================================
// CROSSOVER GROUP
// ============================================================

#[test]
fn test_golden_cross() {
    let closes = [10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 20.0, 25.0];
    let s = fast_sma_engine().augment(&series_from(&closes));
    let detector = DetectorBuilder::new().window(2).with_all_defaults().build().unwrap();
    let events = detector.scan(&s);

    let crosses: Vec<_> = events
        .iter()
        .filter(|e| e.kind.group() == PatternGroup::Crossover)
        .collect();
    assert_eq!(crosses.len(), 1);
    assert_eq!(crosses[0].kind, PatternKind::GoldenCross);
    assert_eq!(crosses[0].index, 9);
    assert_eq!(crosses[0].confidence, Confidence::High);
    assert_eq!(crosses[0].description, "3-day SMA crosses above 5-day SMA");
}

#[test]
fn test_death_cross() {
    let closes = [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 1.0, 1.0];
    let s = fast_sma_engine().augment(&series_from(&closes));
    let detector = DetectorBuilder::new().window(2).with_all_defaults().build().unwrap();
    let events = detector.scan(&s);

    let crosses: Vec<_> = events
        .iter()
        .filter(|e| e.kind.group() == PatternGroup::Crossover)
        .map(|e| (e.kind, e.index, &*e.description))
        .collect();
    assert_eq!(
        crosses,
        vec![(PatternKind::DeathCross, 9, "3-day SMA crosses below 5-day SMA")]
    );
}

#[test]
fn test_no_cross_without_long_sma() {
    // 60 bars never define SMA(200)
    let s = augment(&make_uptrend(60));
    let events = default_detector().scan(&s);
    assert!(of_group(&events, PatternGroup::Crossover).is_empty());
}

// ============================================================
// MOMENTUM AND BAND GROUPS
// ============================================================

#[test]
fn test_overbought_threshold_config() {
    let s = augment(&make_uptrend(25));
    let events = default_detector().scan(&s);
    assert_eq!(
        of_group(&events, PatternGroup::Momentum),
        vec![PatternKind::Overbought; 5]
    );

    // RSI is 100 here, so a 100 threshold never fires
    let strict = DetectorBuilder::new()
        .add(BuiltinRule::Momentum(MomentumRule {
            overbought: 100.0,
            oversold: 30.0,
        }))
        .build()
        .unwrap();
    assert!(strict.scan(&s).is_empty());
}

#[test]
fn test_band_breakouts() {
    let mut closes = vec![50.0; 20];
    closes.push(53.0);
    let s = augment(&closes);
    let events = default_detector().scan(&s);
    assert_eq!(
        of_group(&events, PatternGroup::Band),
        vec![PatternKind::AboveUpperBand]
    );

    closes[20] = 47.0;
    let s = augment(&closes);
    let events = default_detector().scan(&s);
    assert_eq!(
        of_group(&events, PatternGroup::Band),
        vec![PatternKind::BelowLowerBand]
    );
}

// ============================================================
// SHORT SERIES
// ============================================================

#[test]
fn test_exact_window_length_is_empty() {
    let s = augment(&make_uptrend(20));
    let detector = default_detector();
    assert!(detector.scan(&s).is_empty());
    assert!(detector.scan_strict(&s).unwrap().is_empty());
}

#[test]
fn test_short_series() {
    let s = augment(&make_uptrend(5));
    let detector = default_detector();
    assert!(detector.scan(&s).is_empty());
    assert!(matches!(
        detector.scan_strict(&s),
        Err(AnalysisError::InsufficientHistory { need: 20, got: 5 })
    ));
    assert!(detector.scan(&augment(&[])).is_empty());
}

// ============================================================
// ITERATION
// ============================================================

#[test]
fn test_events_in_date_order() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + 10.0 * (i as f64 / 7.0).sin())
        .collect();
    let s = augment(&closes);
    let events = default_detector().scan(&s);
    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| w[0].date <= w[1].date));
}

#[test]
fn test_iterator_exact_size() {
    let s = augment(&make_uptrend(50));
    let detector = default_detector();
    let mut iter = detector.iter(&s);
    assert_eq!(iter.len(), 30);
    iter.next();
    assert_eq!(iter.len(), 29);
}

#[test]
fn test_events_serialize() {
    let s = augment(&make_uptrend(21));
    let events = default_detector().scan(&s);
    let json = serde_json::to_value(&events).unwrap();
    assert_eq!(json[0]["kind"], "Strong Uptrend");
    assert_eq!(json[0]["confidence"], "High");
    assert_eq!(json[0]["date"], "2023-06-21");
}
