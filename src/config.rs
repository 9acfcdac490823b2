//! Robustness engine configuration.
//!
//! `RobustnessConfig` silently normalizes out-of-range values instead of
//! rejecting them: a caller asking for 5000 simulations gets the 1000 cap,
//! not an error. Historical configs carried all sorts of values and the
//! engine is expected to run with the closest legal setting.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bounds applied on construction.
const MIN_SIMULATIONS: usize = 10;
const MAX_SIMULATIONS: usize = 1000;
const MIN_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.999;
const MIN_PARAMETERS: usize = 1;
const MAX_PARAMETERS: usize = 50;

/// Validated settings for the Monte Carlo robustness engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessConfig {
    /// Master switch: when false, `analyze_portfolio` is a cheap no-op.
    pub enabled: bool,
    /// Bootstrap trials per parameter combination (clamped to 10–1000).
    pub num_simulations: usize,
    /// Confidence level for per-metric intervals (clamped to 0.5–0.999).
    pub confidence_level: f64,
    /// Cap on combinations analyzed per strategy (clamped to 1–50).
    pub max_parameters_to_test: usize,
    /// Block length for the block bootstrap, in bars (~one quarter of
    /// trading days by default).
    pub bootstrap_block_size: usize,
    /// Minimum fraction of the original series a resample must retain.
    pub min_data_fraction: f64,
    /// Relative std-dev of parameter noise (0.1 = ±10%).
    pub noise_std: f64,
    /// Worker threads for per-strategy analysis tasks.
    pub max_workers: usize,
    /// Strategies with fewer rows of price data than this are not analyzed.
    pub min_data_rows: usize,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_simulations: 100,
            confidence_level: 0.95,
            max_parameters_to_test: 10,
            bootstrap_block_size: 63,
            min_data_fraction: 0.7,
            noise_std: 0.1,
            max_workers: 4,
            min_data_rows: 100,
        }
    }
}

impl RobustnessConfig {
    /// Build a config from the three primary knobs, clamping to bounds.
    pub fn new(
        num_simulations: usize,
        confidence_level: f64,
        max_parameters_to_test: usize,
    ) -> Self {
        Self {
            num_simulations,
            confidence_level,
            max_parameters_to_test,
            ..Self::default()
        }
        .normalized()
    }

    /// Read a flat key/value settings object.
    ///
    /// Unknown keys are ignored; wrong-typed or missing values fall back to
    /// defaults; out-of-range values are clamped. Never fails.
    pub fn from_settings(settings: &Value) -> Self {
        let defaults = Self::default();
        let config = Self {
            enabled: settings
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enabled),
            num_simulations: get_usize(settings, "num_simulations")
                .unwrap_or(defaults.num_simulations),
            confidence_level: get_f64(settings, "confidence_level")
                .unwrap_or(defaults.confidence_level),
            max_parameters_to_test: get_usize(settings, "max_parameters_to_test")
                .unwrap_or(defaults.max_parameters_to_test),
            bootstrap_block_size: get_usize(settings, "bootstrap_block_size")
                .unwrap_or(defaults.bootstrap_block_size),
            min_data_fraction: get_f64(settings, "min_data_fraction")
                .unwrap_or(defaults.min_data_fraction),
            noise_std: get_f64(settings, "noise_std").unwrap_or(defaults.noise_std),
            max_workers: get_usize(settings, "max_workers").unwrap_or(defaults.max_workers),
            min_data_rows: get_usize(settings, "min_data_rows").unwrap_or(defaults.min_data_rows),
        };
        config.normalized()
    }

    /// Clamp every field to its legal range.
    fn normalized(mut self) -> Self {
        self.num_simulations = self.num_simulations.clamp(MIN_SIMULATIONS, MAX_SIMULATIONS);
        self.confidence_level = if self.confidence_level.is_finite() {
            self.confidence_level.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
        } else {
            Self::default().confidence_level
        };
        self.max_parameters_to_test = self
            .max_parameters_to_test
            .clamp(MIN_PARAMETERS, MAX_PARAMETERS);
        self.bootstrap_block_size = self.bootstrap_block_size.max(1);
        self.min_data_fraction = if self.min_data_fraction.is_finite() {
            self.min_data_fraction.clamp(0.1, 1.0)
        } else {
            Self::default().min_data_fraction
        };
        self.noise_std = if self.noise_std.is_finite() {
            self.noise_std.max(0.0)
        } else {
            Self::default().noise_std
        };
        self.max_workers = self.max_workers.max(1);
        self.min_data_rows = self.min_data_rows.max(1);
        self
    }

    /// Significance level `alpha = 1 - confidence_level`.
    pub fn alpha(&self) -> f64 {
        1.0 - self.confidence_level
    }
}

fn get_usize(settings: &Value, key: &str) -> Option<usize> {
    let v = settings.get(key)?;
    v.as_u64()
        .map(|n| n as usize)
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as usize))
}

fn get_f64(settings: &Value, key: &str) -> Option<f64> {
    settings.get(key)?.as_f64()
}
