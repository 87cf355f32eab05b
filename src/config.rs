//! TOML configuration
//!
//! Every section is optional; missing values fall back to defaults.
//!
//! ```toml
//! [store]
//! duplicates = "keep-last"
//!
//! [detector]
//! window = 20
//! recent_events = 10
//!
//! [rules.trend]
//! max_std_ratio = 0.02
//!
//! [rules.momentum]
//! overbought = 70.0
//! oversold = 30.0
//!
//! [indicators]
//! sma = [20, 50, 200]
//! rsi = 14
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorConfig, IndicatorEngine};
use crate::patterns::{DetectorBuilder, PatternDetector, DEFAULT_WINDOW};
use crate::store::DuplicatePolicy;
use crate::Result;

/// Loader settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub duplicates: DuplicatePolicy,
}

/// Detector window and report length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub window: usize,
    /// Events kept in a report's recent-events table
    pub recent_events: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            recent_events: 10,
        }
    }
}

/// Full analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub store: StoreConfig,
    pub detector: DetectorConfig,
    /// Rule thresholds by rule name, then parameter name
    pub rules: HashMap<String, HashMap<String, f64>>,
    pub indicators: IndicatorConfig,
}

impl AnalysisConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("reading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every section by building the components it configures.
    pub fn validate(&self) -> Result<()> {
        self.indicators.validate()?;
        self.detector()?;
        Ok(())
    }

    pub fn detector(&self) -> Result<PatternDetector> {
        DetectorBuilder::new()
            .window(self.detector.window)
            .with_params(&self.rules)?
            .build()
    }

    pub fn indicator_engine(&self) -> Result<IndicatorEngine> {
        IndicatorEngine::new(self.indicators)
    }
}
