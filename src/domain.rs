//! Core domain types shared by the sampler, analyzer, and orchestrator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
///
/// Callers supply series sorted by date. The bootstrap sampler re-sorts its
/// output by date and may emit duplicate dates (resampled "replays"); those
/// duplicates are intentional and must not be deduplicated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A strategy parameter combination: `(fast, slow)` windows plus an optional
/// signal-line period for MACD-style strategies.
///
/// Invariant: `fast < slow`. The signal period is independent of that
/// ordering constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ParameterCombination {
    pub fast: u32,
    pub slow: u32,
    pub signal: Option<u32>,
}

impl ParameterCombination {
    pub fn new(fast: u32, slow: u32) -> Self {
        Self {
            fast,
            slow,
            signal: None,
        }
    }

    pub fn with_signal(fast: u32, slow: u32, signal: u32) -> Self {
        Self {
            fast,
            slow,
            signal: Some(signal),
        }
    }

    /// Signal period, or 0 when the strategy has none. Used by the canonical
    /// strategy-identity key.
    pub fn signal_or_zero(&self) -> u32 {
        self.signal.unwrap_or(0)
    }
}

impl std::fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.signal {
            Some(sig) => write!(f, "{}/{}/{}", self.fast, self.slow, sig),
            None => write!(f, "{}/{}", self.fast, self.slow),
        }
    }
}

/// Strategy performance over one price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    /// Named fallback used when a single simulation's evaluation fails.
    ///
    /// Zero return, zero Sharpe, full drawdown. Substituted per simulation so
    /// one bad trial never aborts the surrounding analysis.
    pub const fn failed() -> Self {
        Self {
            total_return: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 1.0,
        }
    }
}
