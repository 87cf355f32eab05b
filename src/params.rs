//! Parameter metadata for window rules
//!
//! Rules with tunable thresholds describe them through [`ParamMeta`], which lets
//! configuration files override them by name with range validation.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use stockscan::params::ParameterizedRule;
//! use stockscan::patterns::MomentumRule;
//!
//! for param in MomentumRule::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let params = HashMap::from([("overbought".to_string(), 80.0)]);
//! let rule = MomentumRule::with_params(&params).unwrap();
//! assert_eq!(rule.overbought, 80.0);
//! assert_eq!(rule.oversold, 30.0);
//! ```

use std::collections::HashMap;

use crate::{AnalysisError, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Oscillator level in 0.0..=100.0
  Level,
}

/// Metadata for a single rule parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name as written in configuration (e.g., "overbought")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Accepted range (inclusive)
  pub range: (f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn level(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Level, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(AnalysisError::InvalidValue("parameter must be finite"));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(AnalysisError::OutOfRange { field: self.name, value, min, max });
    }
    Ok(())
  }
}

// ============================================================
// PARAMETERIZED RULE TRAIT
// ============================================================

/// Window rules whose thresholds can be set by name
pub trait ParameterizedRule: Sized {
  /// Configuration section name (e.g., "momentum")
  fn rule_name() -> &'static str;

  /// Metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a rule from named values. Missing parameters use their defaults;
  /// unknown names are rejected.
  fn with_params(params: &HashMap<String, f64>) -> Result<Self>;
}

/// Reject names that no parameter of `rule` declares.
pub fn check_known(rule: &str, meta: &[ParamMeta], params: &HashMap<String, f64>) -> Result<()> {
  match params.keys().find(|k| !meta.iter().any(|m| m.name == k.as_str())) {
    Some(unknown) => {
      Err(AnalysisError::InvalidConfig(format!("unknown parameter {unknown:?} for rule {rule:?}")))
    },
    None => Ok(()),
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Validated value or the declared default
pub fn get_value(params: &HashMap<String, f64>, meta: &ParamMeta) -> Result<f64> {
  let value = params.get(meta.name).copied().unwrap_or(meta.default);
  meta.validate(value)?;
  Ok(value)
}

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<String, f64>, meta: &ParamMeta) -> Result<Ratio> {
  Ratio::new(get_value(params, meta)?)
}

// ============================================================
// TESTS
// ============================================================
