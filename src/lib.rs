//! RobustLab — Monte Carlo parameter robustness analysis for trading
//! strategies.
//!
//! This crate answers one question: does a strategy's backtest performance
//! survive small perturbations of its data and parameters? It provides:
//! - Block-bootstrap resampling of daily price series
//! - Parameter noise injection around declared window pairs
//! - Per-combination stability, robustness, and regime-consistency scores
//! - Bootstrap confidence intervals for return and Sharpe
//! - A concurrent portfolio orchestrator with per-strategy failure isolation
//! - Portfolio-wide aggregates and parameter recommendations
//!
//! Backtesting itself stays behind the [`PerformanceEvaluator`] trait and
//! data acquisition behind [`PriceDataProvider`]; this crate owns only the
//! robustness layer.

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod ingest;
pub mod orchestrator;
pub mod provider;
pub mod result;
pub mod sampler;

pub use analyzer::{confidence_interval, ParameterStabilityAnalyzer};
pub use config::RobustnessConfig;
pub use domain::{ParameterCombination, PerformanceSummary, PriceBar};
pub use evaluator::{EvalError, PerformanceEvaluator};
pub use ingest::{normalize_strategy_record, IngestError, StrategyRecord};
pub use orchestrator::{
    expand_parameter_variations, AnalysisError, OrchestratorError,
    PortfolioRobustnessOrchestrator, ProgressState,
};
pub use provider::{DataError, PriceDataProvider};
pub use result::{
    Confidence, Interval, MetricStats, ParameterStabilityResult, PortfolioRobustnessResult,
    PortfolioStabilityMetrics, Recommendation, SimulationOutcome,
};
pub use sampler::BootstrapSampler;
