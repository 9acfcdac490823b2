//! Per-parameter-combination stability analysis.
//!
//! For each combination the analyzer runs `num_simulations` bootstrap
//! trials: resample the price history, jitter the parameters, evaluate, and
//! record the outcome. Scores summarize the resulting return distribution:
//!
//! - `stability_score` = `max(0, 1 - min(CV, 2)/2)` — low relative variance
//!   of total return across trials scores high.
//! - `parameter_robustness` = `1 / (1 + CV)` — same dispersion metric,
//!   softer tail.
//! - `regime_consistency` — fraction of trials with positive total return.
//!
//! CV is `std / |mean|` of simulated total returns. A zero mean makes the
//! ratio undefined: the stability score treats it as 0 (no dispersion
//! penalty) while robustness treats zero mean with nonzero std as infinite
//! dispersion. That asymmetry is inherited behavior, preserved on purpose.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::warn;

use crate::config::RobustnessConfig;
use crate::domain::{ParameterCombination, PerformanceSummary, PriceBar};
use crate::evaluator::PerformanceEvaluator;
use crate::result::{
    Interval, MetricStats, ParameterStabilityResult, PortfolioRobustnessResult, SimulationOutcome,
};
use crate::sampler::BootstrapSampler;

/// Quantifies how sensitive a parameter combination's performance is to
/// resampling and parameter noise.
#[derive(Debug, Clone)]
pub struct ParameterStabilityAnalyzer {
    config: RobustnessConfig,
    sampler: BootstrapSampler,
}

impl ParameterStabilityAnalyzer {
    pub fn new(config: RobustnessConfig) -> Self {
        let sampler = BootstrapSampler::from_config(&config);
        Self { config, sampler }
    }

    pub fn config(&self) -> &RobustnessConfig {
        &self.config
    }

    /// Analyze every combination (up to `max_parameters_to_test`) for one
    /// strategy and aggregate the results.
    ///
    /// `id` is the ticker, or the canonical strategy identity when called
    /// from the orchestrator.
    pub fn analyze_parameter_stability(
        &self,
        evaluator: &dyn PerformanceEvaluator,
        id: &str,
        ticker: &str,
        data: &[PriceBar],
        combinations: &[ParameterCombination],
        strategy_type: &str,
        strategy_config: &Value,
    ) -> PortfolioRobustnessResult {
        let tested = if combinations.len() > self.config.max_parameters_to_test {
            warn!(
                id,
                requested = combinations.len(),
                cap = self.config.max_parameters_to_test,
                "truncating parameter combinations to configured cap"
            );
            &combinations[..self.config.max_parameters_to_test]
        } else {
            combinations
        };

        let combination_results: Vec<ParameterStabilityResult> = tested
            .iter()
            .map(|combo| {
                self.analyze_single_combination(
                    evaluator,
                    data,
                    *combo,
                    strategy_type,
                    strategy_config,
                )
            })
            .collect();

        let portfolio_stability_score = if combination_results.is_empty() {
            0.0
        } else {
            combination_results
                .iter()
                .map(|r| r.stability_score)
                .sum::<f64>()
                / combination_results.len() as f64
        };

        // Best weighted score wins; strict comparison keeps the earliest on
        // ties.
        let recommended_parameters = combination_results
            .iter()
            .fold(None::<&ParameterStabilityResult>, |best, r| match best {
                Some(b) if r.weighted_score() > b.weighted_score() => Some(r),
                Some(b) => Some(b),
                None => Some(r),
            })
            .map(|r| r.parameters);

        PortfolioRobustnessResult {
            id: id.to_string(),
            ticker: ticker.to_string(),
            combinations_tested: combination_results.len(),
            combination_results,
            portfolio_stability_score,
            recommended_parameters,
            num_simulations: self.config.num_simulations,
            confidence_level: self.config.confidence_level,
        }
    }

    /// Run all bootstrap trials for one combination and derive its scores.
    fn analyze_single_combination(
        &self,
        evaluator: &dyn PerformanceEvaluator,
        data: &[PriceBar],
        combo: ParameterCombination,
        strategy_type: &str,
        strategy_config: &Value,
    ) -> ParameterStabilityResult {
        let base_performance = self.evaluate_or_sentinel(
            evaluator,
            data,
            combo.fast,
            combo.slow,
            strategy_type,
            strategy_config,
        );

        let mut result = ParameterStabilityResult::new(combo, base_performance);
        result.outcomes.reserve(self.config.num_simulations);

        for simulation_id in 0..self.config.num_simulations {
            let seed = simulation_id as u64;
            let sample = self.sampler.block_bootstrap_sample(data, seed);

            // Locally-scoped RNG per trial: deterministic per simulation id,
            // no global RNG state shared across worker threads.
            let mut noise_rng = StdRng::seed_from_u64(seed);
            let (fast, slow) =
                self.sampler
                    .parameter_noise_injection(combo.fast, combo.slow, &mut noise_rng);

            let performance = self.evaluate_or_sentinel(
                evaluator,
                &sample,
                fast,
                slow,
                strategy_type,
                strategy_config,
            );

            result.outcomes.push(SimulationOutcome {
                parameters: ParameterCombination {
                    fast,
                    slow,
                    signal: combo.signal,
                },
                performance,
            });
        }

        let returns: Vec<f64> = result
            .outcomes
            .iter()
            .map(|o| o.performance.total_return)
            .collect();
        let sharpes: Vec<f64> = result
            .outcomes
            .iter()
            .map(|o| o.performance.sharpe_ratio)
            .collect();

        result.return_stats = metric_stats(&returns);
        result.sharpe_stats = metric_stats(&sharpes);

        let alpha = self.config.alpha();
        result.return_interval = confidence_interval(&returns, alpha);
        result.sharpe_interval = confidence_interval(&sharpes, alpha);

        let (stability, robustness) = dispersion_scores(result.return_stats);
        result.stability_score = stability;
        result.parameter_robustness = robustness;
        result.regime_consistency = if returns.is_empty() {
            0.0
        } else {
            returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
        };

        result
    }

    /// Evaluate, substituting the failure sentinel on any error. One bad
    /// trial must never abort the surrounding analysis.
    fn evaluate_or_sentinel(
        &self,
        evaluator: &dyn PerformanceEvaluator,
        series: &[PriceBar],
        fast: u32,
        slow: u32,
        strategy_type: &str,
        strategy_config: &Value,
    ) -> PerformanceSummary {
        match evaluator.evaluate(series, fast, slow, strategy_type, strategy_config) {
            Ok(performance) => performance,
            Err(e) => {
                warn!(
                    strategy_type,
                    fast, slow, error = %e,
                    "performance evaluation failed, substituting sentinel"
                );
                PerformanceSummary::failed()
            }
        }
    }
}

/// Mean and population standard deviation; zeros for an empty slice.
fn metric_stats(values: &[f64]) -> MetricStats {
    let n = values.len();
    if n == 0 {
        return MetricStats::zero();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    MetricStats {
        mean,
        std_dev: variance.sqrt(),
    }
}

/// Stability and robustness scores from the return distribution's CV.
fn dispersion_scores(stats: MetricStats) -> (f64, f64) {
    let cv = if stats.mean != 0.0 {
        stats.std_dev / stats.mean.abs()
    } else {
        0.0
    };
    let stability = (1.0 - cv.min(2.0) / 2.0).max(0.0);
    let robustness = if stats.mean == 0.0 && stats.std_dev > 0.0 {
        0.0
    } else {
        1.0 / (1.0 + cv)
    };
    (stability, robustness)
}

/// Index-based confidence interval at significance `alpha`.
///
/// Sorts the values and takes the elements at `floor(alpha/2 * n)` and
/// `floor((1 - alpha/2) * n)`, both clamped to `n - 1`. Empty input yields
/// `(0.0, 0.0)`.
pub fn confidence_interval(values: &[f64], alpha: f64) -> Interval {
    let n = values.len();
    if n == 0 {
        return Interval::zero();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let lower_idx = ((alpha / 2.0) * n as f64).floor() as usize;
    let upper_idx = ((1.0 - alpha / 2.0) * n as f64).floor() as usize;

    Interval {
        lower: sorted[lower_idx.min(n - 1)],
        upper: sorted[upper_idx.min(n - 1)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalError;
    use chrono::NaiveDate;
    use serde_json::json;

    fn make_series(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let price = 50.0 + (i as f64 * 0.2).sin() * 5.0 + i as f64 * 0.05;
                PriceBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: price,
                    high: price + 0.5,
                    low: price - 0.5,
                    close: price,
                    volume: 10_000,
                }
            })
            .collect()
    }

    /// Evaluator with constant positive performance.
    struct ConstantEvaluator;

    impl PerformanceEvaluator for ConstantEvaluator {
        fn evaluate(
            &self,
            _series: &[PriceBar],
            _fast: u32,
            _slow: u32,
            _strategy_type: &str,
            _config: &Value,
        ) -> Result<PerformanceSummary, EvalError> {
            Ok(PerformanceSummary {
                total_return: 0.1,
                sharpe_ratio: 1.2,
                max_drawdown: 0.05,
            })
        }
    }

    /// Evaluator that always fails.
    struct FailingEvaluator;

    impl PerformanceEvaluator for FailingEvaluator {
        fn evaluate(
            &self,
            _series: &[PriceBar],
            _fast: u32,
            _slow: u32,
            strategy_type: &str,
            _config: &Value,
        ) -> Result<PerformanceSummary, EvalError> {
            Err(EvalError::UnknownStrategyType(strategy_type.to_string()))
        }
    }

    /// Evaluator whose return depends on the perturbed fast window, so the
    /// trial distribution has real spread.
    struct ParamSensitiveEvaluator;

    impl PerformanceEvaluator for ParamSensitiveEvaluator {
        fn evaluate(
            &self,
            series: &[PriceBar],
            fast: u32,
            _slow: u32,
            _strategy_type: &str,
            _config: &Value,
        ) -> Result<PerformanceSummary, EvalError> {
            if series.is_empty() {
                return Err(EvalError::InsufficientData { rows: 0 });
            }
            let ret = (fast as f64 - 10.0) * 0.02 + 0.05;
            Ok(PerformanceSummary {
                total_return: ret,
                sharpe_ratio: ret * 10.0,
                max_drawdown: 0.1,
            })
        }
    }

    fn analyzer(num_simulations: usize) -> ParameterStabilityAnalyzer {
        ParameterStabilityAnalyzer::new(RobustnessConfig::new(num_simulations, 0.95, 10))
    }

    #[test]
    fn constant_evaluator_scores_perfectly_stable() {
        let analyzer = analyzer(20);
        let data = make_series(300);
        let result = analyzer.analyze_parameter_stability(
            &ConstantEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &[ParameterCombination::new(10, 50)],
            "sma_crossover",
            &json!({}),
        );

        assert_eq!(result.combinations_tested, 1);
        let combo = &result.combination_results[0];
        assert_eq!(combo.outcomes.len(), 20);
        // Zero variance: CV 0 → stability 1, robustness 1; all returns
        // positive → regime 1.
        assert!((combo.stability_score - 1.0).abs() < 1e-12);
        assert!((combo.parameter_robustness - 1.0).abs() < 1e-12);
        assert!((combo.regime_consistency - 1.0).abs() < 1e-12);
        assert!(combo.is_stable());
        assert_eq!(result.recommended_parameters, Some(combo.parameters));
        assert!((result.portfolio_stability_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn failing_evaluator_substitutes_sentinel_everywhere() {
        let analyzer = analyzer(10);
        let data = make_series(300);
        let result = analyzer.analyze_parameter_stability(
            &FailingEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &[ParameterCombination::new(10, 50)],
            "nonsense_strategy",
            &json!({}),
        );

        let combo = &result.combination_results[0];
        assert_eq!(combo.base_performance, PerformanceSummary::failed());
        assert!(combo
            .outcomes
            .iter()
            .all(|o| o.performance == PerformanceSummary::failed()));
        // All-zero returns: no positive trials.
        assert_eq!(combo.regime_consistency, 0.0);
        assert!(!combo.is_stable());
    }

    #[test]
    fn empty_data_does_not_panic() {
        let analyzer = analyzer(10);
        let result = analyzer.analyze_parameter_stability(
            &ParamSensitiveEvaluator,
            "X",
            "X",
            &[],
            &[ParameterCombination::new(10, 50)],
            "sma_crossover",
            &json!({}),
        );
        let combo = &result.combination_results[0];
        assert_eq!(combo.base_performance, PerformanceSummary::failed());
        assert_eq!(combo.outcomes.len(), 10);
    }

    #[test]
    fn truncates_to_max_parameters() {
        let config = RobustnessConfig::new(10, 0.95, 3);
        let analyzer = ParameterStabilityAnalyzer::new(config);
        let data = make_series(300);
        let combos: Vec<ParameterCombination> =
            (0..20).map(|i| ParameterCombination::new(5 + i, 60 + i)).collect();

        let result = analyzer.analyze_parameter_stability(
            &ConstantEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &combos,
            "sma_crossover",
            &json!({}),
        );

        assert_eq!(result.combinations_tested, 3);
        // The first three of the input order are the ones analyzed.
        let analyzed: Vec<_> = result
            .combination_results
            .iter()
            .map(|r| r.parameters)
            .collect();
        assert_eq!(analyzed, combos[..3].to_vec());
    }

    #[test]
    fn no_combinations_yields_zero_score_and_no_recommendation() {
        let analyzer = analyzer(10);
        let data = make_series(300);
        let result = analyzer.analyze_parameter_stability(
            &ConstantEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &[],
            "sma_crossover",
            &json!({}),
        );
        assert_eq!(result.portfolio_stability_score, 0.0);
        assert_eq!(result.recommended_parameters, None);
        assert_eq!(result.combinations_tested, 0);
    }

    #[test]
    fn scores_stay_in_unit_interval_with_spread() {
        let analyzer = analyzer(50);
        let data = make_series(300);
        let result = analyzer.analyze_parameter_stability(
            &ParamSensitiveEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &[ParameterCombination::new(10, 50)],
            "sma_crossover",
            &json!({}),
        );
        let combo = &result.combination_results[0];
        for score in [
            combo.stability_score,
            combo.parameter_robustness,
            combo.regime_consistency,
        ] {
            assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
        }
        // Spread exists, so the interval is non-degenerate.
        assert!(combo.return_interval.upper >= combo.return_interval.lower);
    }

    #[test]
    fn recommendation_ties_break_by_input_order() {
        let analyzer = analyzer(10);
        let data = make_series(300);
        let combos = [
            ParameterCombination::new(10, 50),
            ParameterCombination::new(11, 51),
        ];
        // ConstantEvaluator gives both combos identical scores.
        let result = analyzer.analyze_parameter_stability(
            &ConstantEvaluator,
            "AAPL",
            "AAPL",
            &data,
            &combos,
            "sma_crossover",
            &json!({}),
        );
        assert_eq!(result.recommended_parameters, Some(combos[0]));
    }

    #[test]
    fn simulations_are_deterministic_across_runs() {
        let analyzer = analyzer(20);
        let data = make_series(300);
        let combos = [ParameterCombination::new(10, 50)];
        let run = |a: &ParameterStabilityAnalyzer| {
            a.analyze_parameter_stability(
                &ParamSensitiveEvaluator,
                "AAPL",
                "AAPL",
                &data,
                &combos,
                "sma_crossover",
                &json!({}),
            )
        };
        let r1 = run(&analyzer);
        let r2 = run(&analyzer);
        assert_eq!(
            r1.combination_results[0].outcomes,
            r2.combination_results[0].outcomes
        );
        assert_eq!(
            r1.combination_results[0].stability_score,
            r2.combination_results[0].stability_score
        );
    }

    // ─── Confidence interval ─────────────────────────────────────

    #[test]
    fn confidence_interval_empty_is_zero() {
        assert_eq!(confidence_interval(&[], 0.05), Interval::zero());
    }

    #[test]
    fn confidence_interval_indices() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let ci = confidence_interval(&values, 0.05);
        // floor(0.025 * 100) = 2, floor(0.975 * 100) = 97
        assert_eq!(ci.lower, 2.0);
        assert_eq!(ci.upper, 97.0);
    }

    #[test]
    fn confidence_interval_clamps_upper_index() {
        let values = vec![1.0, 2.0, 3.0];
        // alpha 0: upper index floor(1.0 * 3) = 3, clamped to 2.
        let ci = confidence_interval(&values, 0.0);
        assert_eq!(ci.lower, 1.0);
        assert_eq!(ci.upper, 3.0);
    }

    #[test]
    fn confidence_interval_single_value() {
        let ci = confidence_interval(&[7.0], 0.05);
        assert_eq!(ci.lower, 7.0);
        assert_eq!(ci.upper, 7.0);
    }

    // ─── Dispersion scores ───────────────────────────────────────

    #[test]
    fn zero_mean_nonzero_std_gives_zero_robustness() {
        let stats = MetricStats {
            mean: 0.0,
            std_dev: 0.5,
        };
        let (stability, robustness) = dispersion_scores(stats);
        // CV treated as 0 for stability, infinite for robustness.
        assert_eq!(stability, 1.0);
        assert_eq!(robustness, 0.0);
    }

    #[test]
    fn high_cv_floors_stability_at_zero() {
        let stats = MetricStats {
            mean: 0.01,
            std_dev: 1.0,
        };
        let (stability, robustness) = dispersion_scores(stats);
        assert_eq!(stability, 0.0);
        assert!(robustness > 0.0 && robustness < 0.02);
    }

    #[test]
    fn moderate_cv_scores_between_bounds() {
        let stats = MetricStats {
            mean: 0.1,
            std_dev: 0.1,
        };
        let (stability, robustness) = dispersion_scores(stats);
        assert!((stability - 0.5).abs() < 1e-12);
        assert!((robustness - 0.5).abs() < 1e-12);
    }
}
