//! Result types produced by the analyzer and orchestrator.
//!
//! Everything here is `Serialize` so the report layer can emit JSON/CSV
//! without this crate's involvement. Results are immutable once the
//! orchestrator collects them; the caller owns them exclusively after
//! return.

use serde::{Deserialize, Serialize};

use crate::domain::{ParameterCombination, PerformanceSummary};

/// Thresholds for the `is_stable` verdict.
const STABILITY_THRESHOLD: f64 = 0.5;
const ROBUSTNESS_THRESHOLD: f64 = 0.4;
const REGIME_THRESHOLD: f64 = 0.4;

/// Weights for the recommendation score.
const STABILITY_WEIGHT: f64 = 0.4;
const ROBUSTNESS_WEIGHT: f64 = 0.4;
const REGIME_WEIGHT: f64 = 0.2;

/// One bootstrap trial: the perturbed parameters used and the performance
/// they produced on the resampled series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub parameters: ParameterCombination,
    pub performance: PerformanceSummary,
}

/// Mean and standard deviation of one metric across simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl MetricStats {
    pub const fn zero() -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
        }
    }
}

/// A confidence interval for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub const fn zero() -> Self {
        Self {
            lower: 0.0,
            upper: 0.0,
        }
    }
}

/// Stability analysis of a single parameter combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterStabilityResult {
    pub parameters: ParameterCombination,
    /// Performance on the unperturbed original series with the original
    /// parameters.
    pub base_performance: PerformanceSummary,
    pub outcomes: Vec<SimulationOutcome>,
    pub return_stats: MetricStats,
    pub sharpe_stats: MetricStats,
    pub return_interval: Interval,
    pub sharpe_interval: Interval,
    /// `max(0, 1 - min(CV, 2)/2)` over simulated total returns, in [0, 1].
    pub stability_score: f64,
    /// `1 / (1 + CV)` over simulated total returns, in [0, 1].
    pub parameter_robustness: f64,
    /// Fraction of simulations with positive total return, in [0, 1].
    pub regime_consistency: f64,
}

impl ParameterStabilityResult {
    /// New result with derived fields zeroed; the analyzer fills them in.
    pub fn new(parameters: ParameterCombination, base_performance: PerformanceSummary) -> Self {
        Self {
            parameters,
            base_performance,
            outcomes: Vec::new(),
            return_stats: MetricStats::zero(),
            sharpe_stats: MetricStats::zero(),
            return_interval: Interval::zero(),
            sharpe_interval: Interval::zero(),
            stability_score: 0.0,
            parameter_robustness: 0.0,
            regime_consistency: 0.0,
        }
    }

    /// All three scores above their thresholds (0.5 / 0.4 / 0.4, strict).
    pub fn is_stable(&self) -> bool {
        self.stability_score > STABILITY_THRESHOLD
            && self.parameter_robustness > ROBUSTNESS_THRESHOLD
            && self.regime_consistency > REGIME_THRESHOLD
    }

    /// Weighted score used to pick the recommended combination.
    pub fn weighted_score(&self) -> f64 {
        STABILITY_WEIGHT * self.stability_score
            + ROBUSTNESS_WEIGHT * self.parameter_robustness
            + REGIME_WEIGHT * self.regime_consistency
    }
}

/// Robustness analysis of one strategy across its tested combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRobustnessResult {
    /// Ticker, or the canonical strategy id when produced by the
    /// orchestrator.
    pub id: String,
    pub ticker: String,
    pub combination_results: Vec<ParameterStabilityResult>,
    /// Mean of per-combination stability scores (0.0 when none).
    pub portfolio_stability_score: f64,
    /// Best combination by weighted score; `None` when nothing was tested.
    pub recommended_parameters: Option<ParameterCombination>,
    pub num_simulations: usize,
    pub confidence_level: f64,
    pub combinations_tested: usize,
}

impl PortfolioRobustnessResult {
    /// Mean `parameter_robustness` over tested combinations (0.0 when none).
    pub fn mean_parameter_robustness(&self) -> f64 {
        if self.combination_results.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .combination_results
            .iter()
            .map(|r| r.parameter_robustness)
            .sum();
        sum / self.combination_results.len() as f64
    }

    /// True if at least one tested combination is stable.
    pub fn has_stable_combination(&self) -> bool {
        self.combination_results.iter().any(|r| r.is_stable())
    }

    /// The stability result of the recommended combination, when present.
    pub fn recommended_result(&self) -> Option<&ParameterStabilityResult> {
        let recommended = self.recommended_parameters?;
        self.combination_results
            .iter()
            .find(|r| r.parameters == recommended)
    }
}

/// Portfolio-wide aggregates over all surviving strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStabilityMetrics {
    pub portfolio_stability_score: f64,
    pub average_parameter_robustness: f64,
    pub stable_tickers_percentage: f64,
}

/// Confidence label attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

/// A per-strategy parameter recommendation for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy_id: String,
    pub parameters: ParameterCombination,
    pub stability_score: f64,
    pub confidence: Confidence,
    pub parameter_count: usize,
}
