//! Portfolio-level orchestration of parameter stability analysis.
//!
//! Each input strategy record gets a stable identity, a parameter-variation
//! grid, and one analysis task on a bounded worker pool. Tasks are
//! independent: a failing fetch or short data series records a manifest
//! entry for that strategy and leaves every other task untouched. Results
//! are collected in completion order under a mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::analyzer::ParameterStabilityAnalyzer;
use crate::config::RobustnessConfig;
use crate::domain::ParameterCombination;
use crate::evaluator::PerformanceEvaluator;
use crate::ingest::{normalize_strategy_record, IngestError, StrategyRecord};
use crate::provider::{DataError, PriceDataProvider};
use crate::result::{
    Confidence, PortfolioRobustnessResult, PortfolioStabilityMetrics, Recommendation,
};

/// Window deltas tried around the declared `(short, long)` pair.
const VARIATION_DELTAS: [i64; 6] = [-3, -2, -1, 1, 2, 3];
/// Floor for perturbed short windows and (exclusive) ceiling for long ones.
const MIN_SHORT_WINDOW: i64 = 5;
const MAX_LONG_WINDOW: u32 = 100;

/// Fatal errors that make the whole run meaningless. Raised before any
/// worker is scheduled; per-strategy failures go to the error manifest
/// instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// One entry in the run's error manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub strategy_id: String,
    pub message: String,
    pub error_type: String,
}

/// Per-run progress counters, surfaced through the progress callback and
/// discarded when `analyze_portfolio` returns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressState {
    pub total: usize,
    pub completed: usize,
    /// Identity of the most recently dispatched strategy.
    pub current: String,
    pub errors: Vec<AnalysisError>,
}

/// Failure of a single strategy's task. Recorded in the manifest, never
/// propagated.
#[derive(Debug, Error)]
enum TaskError {
    #[error("data unavailable for {ticker}: {source}")]
    DataUnavailable {
        ticker: String,
        #[source]
        source: DataError,
    },

    #[error("insufficient data for {ticker}: {rows} rows < minimum {min}")]
    InsufficientData {
        ticker: String,
        rows: usize,
        min: usize,
    },
}

impl TaskError {
    fn kind(&self) -> &'static str {
        match self {
            TaskError::DataUnavailable { .. } => "DataUnavailable",
            TaskError::InsufficientData { .. } => "InsufficientData",
        }
    }
}

/// Runs stability analysis concurrently across many strategies.
pub struct PortfolioRobustnessOrchestrator {
    config: RobustnessConfig,
    analyzer: ParameterStabilityAnalyzer,
    provider: Arc<dyn PriceDataProvider>,
    evaluator: Arc<dyn PerformanceEvaluator>,
    results: HashMap<String, PortfolioRobustnessResult>,
    errors: Vec<AnalysisError>,
}

impl PortfolioRobustnessOrchestrator {
    pub fn new(
        config: RobustnessConfig,
        provider: Arc<dyn PriceDataProvider>,
        evaluator: Arc<dyn PerformanceEvaluator>,
    ) -> Self {
        let analyzer = ParameterStabilityAnalyzer::new(config.clone());
        Self {
            config,
            analyzer,
            provider,
            evaluator,
            results: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn config(&self) -> &RobustnessConfig {
        &self.config
    }

    /// Results of the last run, keyed by strategy identity.
    pub fn results(&self) -> &HashMap<String, PortfolioRobustnessResult> {
        &self.results
    }

    /// Error manifest of the last run.
    pub fn errors(&self) -> &[AnalysisError] {
        &self.errors
    }

    /// Analyze every strategy in `records`.
    ///
    /// Returns the (possibly partial) result map; per-strategy failures land
    /// in `errors()`. Only configuration errors — an unusable record or a
    /// worker pool that cannot be built — fail the call itself.
    pub fn analyze_portfolio(
        &mut self,
        records: &[Value],
    ) -> Result<&HashMap<String, PortfolioRobustnessResult>, OrchestratorError> {
        self.analyze_portfolio_with_progress(records, None)
    }

    /// Like `analyze_portfolio`, invoking `progress_cb` after each completed
    /// task. Callbacks run under the progress lock and may be called from
    /// any worker thread.
    pub fn analyze_portfolio_with_progress(
        &mut self,
        records: &[Value],
        progress_cb: Option<&(dyn Fn(&ProgressState) + Sync)>,
    ) -> Result<&HashMap<String, PortfolioRobustnessResult>, OrchestratorError> {
        self.results.clear();
        self.errors.clear();

        if !self.config.enabled {
            info!("robustness analysis disabled, skipping {} strategies", records.len());
            return Ok(&self.results);
        }

        // Normalize before scheduling anything: a record without a strategy
        // type is a configuration error, not a task failure.
        let normalized: Vec<StrategyRecord> = records
            .iter()
            .enumerate()
            .map(|(index, record)| normalize_strategy_record(record, index))
            .collect::<Result<_, _>>()?;

        let ids = assign_identities(&normalized);
        let tasks: Vec<(String, StrategyRecord)> = ids.into_iter().zip(normalized).collect();

        info!(
            strategies = tasks.len(),
            workers = self.config.max_workers,
            simulations = self.config.num_simulations,
            "starting portfolio robustness run"
        );

        let progress = Mutex::new(ProgressState {
            total: tasks.len(),
            ..ProgressState::default()
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| OrchestratorError::WorkerPool(e.to_string()))?;

        let outcomes: Vec<(String, Result<PortfolioRobustnessResult, TaskError>)> =
            pool.install(|| {
                tasks
                    .par_iter()
                    .map(|(id, record)| {
                        {
                            let mut state =
                                progress.lock().expect("progress state lock poisoned");
                            state.current = id.clone();
                        }

                        let outcome = self.run_task(id, record);

                        let mut state =
                            progress.lock().expect("progress state lock poisoned");
                        state.completed += 1;
                        if let Err(e) = &outcome {
                            warn!(strategy_id = %id, error = %e, "strategy analysis failed");
                            state.errors.push(AnalysisError {
                                strategy_id: id.clone(),
                                message: e.to_string(),
                                error_type: e.kind().to_string(),
                            });
                        }
                        if let Some(cb) = progress_cb {
                            cb(&state);
                        }

                        (id.clone(), outcome)
                    })
                    .collect()
            });

        let final_state = progress.into_inner().expect("progress state lock poisoned");
        self.errors = final_state.errors;

        for (id, outcome) in outcomes {
            if let Ok(result) = outcome {
                self.results.insert(id, result);
            }
        }

        info!(
            succeeded = self.results.len(),
            failed = self.errors.len(),
            "portfolio robustness run complete"
        );
        Ok(&self.results)
    }

    /// Fetch data, gate on the minimum row threshold, and analyze one
    /// strategy.
    fn run_task(
        &self,
        id: &str,
        record: &StrategyRecord,
    ) -> Result<PortfolioRobustnessResult, TaskError> {
        let data = self
            .provider
            .fetch(&record.ticker)
            .map_err(|source| TaskError::DataUnavailable {
                ticker: record.ticker.clone(),
                source,
            })?;

        if data.len() < self.config.min_data_rows {
            return Err(TaskError::InsufficientData {
                ticker: record.ticker.clone(),
                rows: data.len(),
                min: self.config.min_data_rows,
            });
        }

        let combinations = expand_parameter_variations(
            record.short_window,
            record.long_window,
            record.signal_window,
            self.config.max_parameters_to_test,
        );

        Ok(self.analyzer.analyze_parameter_stability(
            &*self.evaluator,
            id,
            &record.ticker,
            &data,
            &combinations,
            &record.strategy_type,
            &record.raw,
        ))
    }

    /// Portfolio-wide aggregates over all strategies that produced a result.
    pub fn portfolio_stability_metrics(&self) -> PortfolioStabilityMetrics {
        let n = self.results.len();
        if n == 0 {
            return PortfolioStabilityMetrics {
                portfolio_stability_score: 0.0,
                average_parameter_robustness: 0.0,
                stable_tickers_percentage: 0.0,
            };
        }

        let stability_sum: f64 = self
            .results
            .values()
            .map(|r| r.portfolio_stability_score)
            .sum();
        let robustness_sum: f64 = self
            .results
            .values()
            .map(|r| r.mean_parameter_robustness())
            .sum();
        let stable_count = self
            .results
            .values()
            .filter(|r| r.has_stable_combination())
            .count();

        PortfolioStabilityMetrics {
            portfolio_stability_score: stability_sum / n as f64,
            average_parameter_robustness: robustness_sum / n as f64,
            stable_tickers_percentage: stable_count as f64 / n as f64,
        }
    }

    /// Per-strategy recommendations sorted by stability score descending,
    /// optionally truncated to `limit`.
    pub fn recommendations(&self, limit: Option<usize>) -> Vec<Recommendation> {
        let mut recs: Vec<Recommendation> = self
            .results
            .values()
            .filter_map(|result| {
                let recommended = result.recommended_result()?;
                Some(Recommendation {
                    strategy_id: result.id.clone(),
                    parameters: recommended.parameters,
                    stability_score: recommended.stability_score,
                    confidence: if recommended.stability_score > 0.8 {
                        Confidence::High
                    } else {
                        Confidence::Medium
                    },
                    parameter_count: result.combinations_tested,
                })
            })
            .collect();

        recs.sort_by(|a, b| {
            b.stability_score
                .partial_cmp(&a.stability_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(limit) = limit {
            recs.truncate(limit);
        }
        recs
    }
}

/// Assign a unique identity to each record: the canonical key, with `_1`,
/// `_2`, ... appended to later duplicates in encounter order.
fn assign_identities(records: &[StrategyRecord]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .iter()
        .map(|record| {
            let key = record.canonical_key();
            let count = seen.entry(key.clone()).or_insert(0);
            let id = if *count == 0 {
                key.clone()
            } else {
                format!("{key}_{count}")
            };
            *count += 1;
            id
        })
        .collect()
}

/// Expand a declared `(short, long)` pair into the variation grid.
///
/// Cartesian product of ±1..±3 deltas plus the original pair, clamped to
/// `short >= 5` and `long > short`, filtered to `short < long < 100`, then
/// deduplicated, sorted, and truncated.
pub fn expand_parameter_variations(
    short: u32,
    long: u32,
    signal: Option<u32>,
    max_combinations: usize,
) -> Vec<ParameterCombination> {
    let mut combos = vec![ParameterCombination {
        fast: short,
        slow: long,
        signal,
    }];

    for short_delta in VARIATION_DELTAS {
        for long_delta in VARIATION_DELTAS {
            let new_short = (i64::from(short) + short_delta).max(MIN_SHORT_WINDOW);
            let new_long = (i64::from(long) + long_delta).max(new_short + 1);
            // Bounds checked in i64 so the u32 casts below cannot wrap for
            // declared windows near u32::MAX.
            if new_long >= i64::from(MAX_LONG_WINDOW) {
                continue;
            }
            combos.push(ParameterCombination {
                fast: new_short as u32,
                slow: new_long as u32,
                signal,
            });
        }
    }

    combos.retain(|c| c.fast < c.slow && c.slow < MAX_LONG_WINDOW);
    combos.sort();
    combos.dedup();
    combos.truncate(max_combinations);
    combos
}
