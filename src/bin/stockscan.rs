//! stockscan - command line front end
//!
//! ```bash
//! stockscan --data stocks.csv symbols
//! stockscan --data stocks.csv analyze --symbol AAPL --start 2024-01-01 --recent 5
//! stockscan --data stocks.csv --config stockscan.toml scan-all --json
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use env_logger::{Env, Target};
use serde::Serialize;

use stockscan::prelude::*;
use stockscan::store::parse_date;

#[derive(Parser)]
#[command(name = "stockscan", version)]
#[command(about = "Technical indicators, pattern detection and risk summaries for daily stock bars")]
struct Cli {
    /// CSV file with daily bars (date, symbol, open, high, low, close, volume)
    #[arg(short, long)]
    data: PathBuf,

    /// Optional TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available symbols
    Symbols,

    /// Summary and recent patterns for one symbol
    Analyze {
        #[arg(short, long)]
        symbol: String,

        /// First chart date (inclusive)
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,

        /// Last chart date (inclusive)
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,

        /// Detector window in bars
        #[arg(short, long)]
        window: Option<usize>,

        /// Number of recent events to show
        #[arg(short, long)]
        recent: Option<usize>,

        /// Print the full report, chart series included, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize every symbol in parallel
    ScanAll {
        #[arg(long)]
        json: bool,
    },
}

fn date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("unrecognized date {s:?} (expected e.g. 2024-01-31)"))
}

/// One line of `scan-all` output
#[derive(Serialize)]
struct ScanRow<'a> {
    symbol: &'a str,
    as_of: NaiveDate,
    current_price: f64,
    annualized_return: f64,
    sharpe_ratio: f64,
    total_events: usize,
    latest_event: Option<PatternKind>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AnalysisError>() {
                Some(e) if e.is_recoverable() => eprintln!("{}", e.user_message()),
                _ => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let store = Store::load(&cli.data, config.store.duplicates)
        .with_context(|| format!("failed to load {}", cli.data.display()))?;

    match cli.command {
        Commands::Symbols => {
            let mut out = std::io::stdout().lock();
            for series in store.iter() {
                let first = series.first_date().map_or_else(String::new, |d| d.to_string());
                let last = series.last_date().map_or_else(String::new, |d| d.to_string());
                writeln!(out, "{:<10} {:>6} bars  {first} .. {last}", series.symbol(), series.len())?;
            }
        }
        Commands::Analyze {
            symbol,
            start,
            end,
            window,
            recent,
            json,
        } => {
            if let Some(window) = window {
                config.detector.window = window;
            }
            if let Some(recent) = recent {
                config.detector.recent_events = recent;
            }
            let analyzer = Analyzer::new(&store, config)?;
            let report = analyzer.analyze(&AnalysisRequest::new(symbol).between(start, end))?;

            if json {
                print_json(&report)?;
            } else {
                print_report(&report)?;
            }
        }
        Commands::ScanAll { json } => {
            let analyzer = Analyzer::new(&store, config)?;
            let (reports, failures) = analyzer.analyze_all();
            for failure in &failures {
                log::warn!("{}: {}", failure.symbol, failure.error);
            }

            let rows: Vec<ScanRow> = reports
                .iter()
                .map(|r| ScanRow {
                    symbol: &r.summary.symbol,
                    as_of: r.summary.as_of,
                    current_price: r.summary.current_price,
                    annualized_return: r.summary.annualized_return,
                    sharpe_ratio: r.summary.sharpe_ratio,
                    total_events: r.total_events,
                    latest_event: r.recent_events.last().map(|e| e.kind),
                })
                .collect();

            if json {
                print_json(&rows)?;
            } else {
                print_scan(&rows)?;
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_report(report: &Report) -> Result<()> {
    let mut out = std::io::stdout().lock();

    for (label, value) in report.summary.display_rows() {
        writeln!(out, "{label:<16} {value}")?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Recent patterns ({} of {}):",
        report.recent_events.len(),
        report.total_events
    )?;
    for event in &report.recent_events {
        writeln!(
            out,
            "  {}  {:<18} {:<7} {}",
            event.date,
            event.kind.name(),
            event.confidence,
            event.description
        )?;
    }
    Ok(())
}

fn print_scan(rows: &[ScanRow]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{:<10} {:<10} {:>10} {:>9} {:>7} {:>7}  latest",
        "symbol", "as of", "price", "return", "sharpe", "events"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<10} {:<10} {:>10.2} {:>8.2}% {:>7.2} {:>7}  {}",
            row.symbol,
            row.as_of,
            row.current_price,
            row.annualized_return * 100.0,
            row.sharpe_ratio,
            row.total_events,
            row.latest_event.map_or("-", |k| k.name())
        )?;
    }
    Ok(())
}
