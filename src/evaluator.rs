//! Strategy-performance boundary.
//!
//! The engine never computes signals or returns itself; it calls out through
//! `PerformanceEvaluator` and treats any error as a degraded simulation,
//! substituting `PerformanceSummary::failed()` for that trial only.

use serde_json::Value;
use thiserror::Error;

use crate::domain::{PerformanceSummary, PriceBar};

/// Errors from strategy performance evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("insufficient data: {rows} bars")]
    InsufficientData { rows: usize },

    #[error("unknown strategy type: {0}")]
    UnknownStrategyType(String),

    #[error("evaluation failed: {0}")]
    Other(String),
}

/// Evaluates one strategy configuration on one price series.
///
/// Implementations must be pure functions of their inputs — bootstrap
/// determinism relies on it. Degenerate input (empty series, unknown
/// strategy type) should be reported as `Err`, never a panic; the analyzer
/// converts errors to the failure sentinel and keeps going.
pub trait PerformanceEvaluator: Send + Sync {
    fn evaluate(
        &self,
        series: &[PriceBar],
        fast_period: u32,
        slow_period: u32,
        strategy_type: &str,
        strategy_config: &Value,
    ) -> Result<PerformanceSummary, EvalError>;
}
