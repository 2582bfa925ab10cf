//! Exhaustive or sampled hyperparameter search.
//!
//! Every combination builds a fresh model from its `ModelParams` and is scored in one
//! of three modes:
//! - Expanding window: backtest with retraining at every prediction point
//! - Split: fit on the series, forecast the validation series
//! - Fitted values: fit on the series, compare its in-sample fitted values
//!
//! Combinations are evaluated in parallel on a rayon pool. Results are collected in
//! enumeration order, so the winner does not depend on scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::{BacktestConfig, Backtester};
use crate::error::{ForecastError, Result};
use crate::metrics::{Metric, Reduction};
use crate::model::{Covariates, ForecastingModel, FromParams, ModelParams};
use crate::series::TimeSeries;
use crate::walkforward::{RetrainPolicy, Start, WalkForwardConfig};

use super::grid::{sample_indices, ParameterGrid, SampleSize};

/// Worker threads used to evaluate combinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parallelism {
    #[default]
    Sequential,
    Threads(usize),
    /// One worker per core.
    All,
}

impl Parallelism {
    /// From a job count: `-1` (or any negative) uses all cores, `0`/`1` runs sequentially.
    pub fn from_jobs(n_jobs: i64) -> Self {
        match n_jobs {
            n if n < 0 => Self::All,
            0 | 1 => Self::Sequential,
            n => Self::Threads(n as usize),
        }
    }
}

/// How combinations are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchMode {
    ExpandingWindow { forecast_horizon: usize },
    Split,
    FittedValues,
}

/// Configuration for a grid search.
#[derive(Debug, Clone)]
pub struct GridSearchConfig {
    /// Selects expanding-window mode.
    pub forecast_horizon: Option<usize>,
    /// Selects fitted-values mode.
    pub use_fitted_values: bool,
    /// First prediction point in expanding-window mode.
    pub start: Start,
    pub stride: usize,
    pub last_points_only: bool,
    pub train_length: Option<usize>,
    /// Only the first metric is used for ranking.
    pub metric: Metric,
    pub reduction: Reduction,
    /// Evaluate a random subset of the grid.
    pub n_random_samples: Option<SampleSize>,
    pub seed: Option<u64>,
    pub parallelism: Parallelism,
    pub verbose: bool,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            forecast_horizon: None,
            use_fitted_values: false,
            start: Start::default(),
            stride: 1,
            last_points_only: false,
            train_length: None,
            metric: Metric::MAPE,
            reduction: Reduction::Mean,
            n_random_samples: None,
            seed: None,
            parallelism: Parallelism::Sequential,
            verbose: false,
        }
    }
}

impl GridSearchConfig {
    pub fn with_forecast_horizon(mut self, horizon: usize) -> Self {
        self.forecast_horizon = Some(horizon);
        self
    }

    pub fn with_fitted_values(mut self, use_fitted_values: bool) -> Self {
        self.use_fitted_values = use_fitted_values;
        self
    }

    pub fn with_start(mut self, start: Start) -> Self {
        self.start = start;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_last_points_only(mut self, last_points_only: bool) -> Self {
        self.last_points_only = last_points_only;
        self
    }

    pub fn with_train_length(mut self, train_length: Option<usize>) -> Self {
        self.train_length = train_length;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_random_samples(mut self, samples: SampleSize, seed: Option<u64>) -> Self {
        self.n_random_samples = Some(samples);
        self.seed = seed;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve the scoring mode. Exactly one mode must be selected.
    pub fn mode(&self, has_validation: bool) -> Result<SearchMode> {
        let selected = [self.forecast_horizon.is_some(), has_validation, self.use_fitted_values]
            .iter()
            .filter(|s| **s)
            .count();
        if selected != 1 {
            return Err(ForecastError::SearchModeConflict(selected));
        }
        Ok(match self.forecast_horizon {
            Some(forecast_horizon) => SearchMode::ExpandingWindow { forecast_horizon },
            None if has_validation => SearchMode::Split,
            None => SearchMode::FittedValues,
        })
    }
}

/// Score of one evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub params: ModelParams,
    pub score: f64,
}

/// Best combination found.
#[derive(Debug)]
pub struct GridSearchResult<M> {
    /// Untrained model built from the best parameters.
    pub model: M,
    pub params: ModelParams,
    pub score: f64,
    /// Every evaluated combination in enumeration order.
    pub evaluations: Vec<Evaluation>,
}

/// Grid search over a model's hyperparameters.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParameterGrid,
    config: GridSearchConfig,
}

impl GridSearch {
    pub fn new(grid: ParameterGrid, config: GridSearchConfig) -> Self {
        Self { grid, config }
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    /// Combinations to evaluate, after optional sampling.
    pub fn candidates(&self) -> Result<Vec<ModelParams>> {
        let all = self.grid.combinations();
        if all.is_empty() {
            return Err(ForecastError::InvalidParameter {
                name: "parameters",
                reason: "the grid has no combinations".to_string(),
            });
        }
        let Some(samples) = self.config.n_random_samples else {
            return Ok(all);
        };
        let n = samples.resolve(all.len())?;
        let picked = sample_indices(all.len(), n, self.config.seed);
        Ok(picked.into_iter().map(|i| all[i].clone()).collect())
    }

    /// Find the best combination for `series`.
    ///
    /// `validation` selects split mode; `covariates` are used for fitting and forecasting
    /// in every mode.
    pub fn run<M>(
        &self,
        series: &TimeSeries,
        covariates: &Covariates,
        validation: Option<&TimeSeries>,
    ) -> Result<GridSearchResult<M>>
    where
        M: ForecastingModel + FromParams,
    {
        let mode = self.config.mode(validation.is_some())?;
        let candidates = self.candidates()?;

        // configuration problems surface once, before any worker starts
        let probe = M::from_params(&candidates[0])?;
        match mode {
            SearchMode::FittedValues if !probe.capabilities().fitted_values => {
                return Err(ForecastError::FittedValuesUnavailable(probe.name().to_string()));
            }
            SearchMode::Split => {
                if let Some(validation) = validation {
                    if validation.width() != series.width() {
                        return Err(ForecastError::InvalidParameter {
                            name: "validation_series",
                            reason: format!(
                                "width {} does not match the series width {}",
                                validation.width(),
                                series.width()
                            ),
                        });
                    }
                }
            }
            _ => {}
        }

        info!(
            "Grid search for {}: {} of {} combinations, mode {:?}",
            probe.name(),
            candidates.len(),
            self.grid.total_combinations(),
            mode
        );

        let progress = AtomicUsize::new(0);
        let total = candidates.len();
        let evaluate = |params: &ModelParams| -> Result<f64> {
            let mut model = M::from_params(params)?;
            let score = self.score(&mut model, mode, series, covariates, validation)?;

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if self.config.verbose && (done % (total / 10).max(1) == 0 || done == total) {
                info!(
                    "  {:.0}% ({}/{} combinations)",
                    done as f64 / total as f64 * 100.0,
                    done,
                    total
                );
            }
            Ok(score)
        };

        let scores: Vec<Result<f64>> = match self.config.parallelism {
            Parallelism::Sequential => candidates.iter().map(evaluate).collect(),
            parallelism => {
                let threads = match parallelism {
                    Parallelism::Threads(n) => n,
                    _ => 0,
                };
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| candidates.par_iter().map(evaluate).collect())
            }
        };
        let scores = scores.into_iter().collect::<Result<Vec<f64>>>()?;

        let evaluations: Vec<Evaluation> = candidates
            .into_iter()
            .zip(scores)
            .map(|(params, score)| Evaluation { params, score })
            .collect();

        let best = best_evaluation(&evaluations).ok_or(ForecastError::NoValidCombination)?;
        info!("Best parameters: {} (score {:.4})", best.params.key(), best.score);

        Ok(GridSearchResult {
            model: M::from_params(&best.params)?,
            params: best.params.clone(),
            score: best.score,
            evaluations,
        })
    }

    fn score<M: ForecastingModel>(
        &self,
        model: &mut M,
        mode: SearchMode,
        series: &TimeSeries,
        covariates: &Covariates,
        validation: Option<&TimeSeries>,
    ) -> Result<f64> {
        let metric = self.config.metric;
        match mode {
            SearchMode::ExpandingWindow { forecast_horizon } => {
                let walk_forward = WalkForwardConfig::default()
                    .with_start(self.config.start)
                    .with_forecast_horizon(forecast_horizon)
                    .with_stride(self.config.stride)
                    .with_retrain(RetrainPolicy::Always)
                    .with_last_points_only(self.config.last_points_only)
                    .with_train_length(self.config.train_length);
                let backtester = Backtester::new(
                    BacktestConfig::default()
                        .with_walk_forward(walk_forward)
                        .with_metrics(vec![metric])
                        .with_reduction(Some(self.config.reduction)),
                );
                let result = backtester.run(model, series, covariates)?;
                result.score.first().ok_or(ForecastError::NoValidCombination)
            }
            SearchMode::Split => {
                let validation = validation.ok_or(ForecastError::SearchModeConflict(0))?;
                model.fit(series, covariates)?;
                let forecast = model.predict(validation.len(), series, covariates, 1)?;
                Ok(metric.evaluate(validation, &forecast)?)
            }
            SearchMode::FittedValues => {
                model.fit(series, covariates)?;
                let fitted = model
                    .fitted_values()
                    .ok_or_else(|| ForecastError::FittedValuesUnavailable(model.name().to_string()))?;
                Ok(metric.evaluate(series, &fitted)?)
            }
        }
    }
}

/// Lowest score, first in order on ties. NaN scores never win.
fn best_evaluation(evaluations: &[Evaluation]) -> Option<&Evaluation> {
    let mut best: Option<&Evaluation> = None;
    for evaluation in evaluations {
        if evaluation.score.is_nan() {
            continue;
        }
        if best.map_or(true, |b| evaluation.score < b.score) {
            best = Some(evaluation);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExponentialSmoothing, MovingAverage, NaiveMean};

    fn ramp(n: usize) -> TimeSeries {
        TimeSeries::from_values((1..=n).map(|i| i as f64).collect()).unwrap()
    }

    fn eval(score: f64) -> Evaluation {
        Evaluation {
            params: ModelParams::new().with("score", score),
            score,
        }
    }

    #[test]
    fn test_best_evaluation_rules() {
        let evaluations = vec![eval(f64::NAN), eval(2.0), eval(1.0), eval(1.0)];
        let best = best_evaluation(&evaluations).unwrap();
        assert!(std::ptr::eq(best, &evaluations[2]));

        assert!(best_evaluation(&[eval(f64::NAN)]).is_none());
    }

    #[test]
    fn test_mode_resolution() {
        let config = GridSearchConfig::default();
        assert!(matches!(config.mode(false), Err(ForecastError::SearchModeConflict(0))));
        assert_eq!(config.mode(true).unwrap(), SearchMode::Split);

        let config = GridSearchConfig::default().with_forecast_horizon(3);
        assert!(matches!(config.mode(true), Err(ForecastError::SearchModeConflict(2))));

        let config = GridSearchConfig::default().with_fitted_values(true);
        assert_eq!(config.mode(false).unwrap(), SearchMode::FittedValues);
    }

    #[test]
    fn test_expanding_window_prefers_short_window_on_trend() {
        let grid = ParameterGrid::new().with("window", [1usize, 3, 5]);
        let search = GridSearch::new(
            grid,
            GridSearchConfig::default()
                .with_forecast_horizon(1)
                .with_start(Start::Position(10))
                .with_metric(Metric::MAE),
        );
        let result = search
            .run::<MovingAverage>(&ramp(30), &Covariates::none(), None)
            .unwrap();
        assert_eq!(result.model.window(), 1);
        assert_eq!(result.evaluations.len(), 3);
        assert_eq!(result.score, 1.0);
        assert!(!result.model.is_fitted());
    }

    #[test]
    fn test_split_mode() {
        let grid = ParameterGrid::new().with("alpha", [0.1, 1.0]);
        let search = GridSearch::new(grid, GridSearchConfig::default().with_metric(Metric::MAE));
        let series = ramp(10);
        let validation = TimeSeries::univariate(
            crate::series::TimeIndex::range(10, 1, 2).unwrap(),
            vec![11.0, 12.0],
        )
        .unwrap();
        let result = search
            .run::<ExponentialSmoothing>(&series, &Covariates::none(), Some(&validation))
            .unwrap();
        assert_eq!(result.params.get("alpha"), Some(&crate::model::ParamValue::Float(1.0)));
    }

    #[test]
    fn test_fitted_values_mode_requires_capability() {
        let search = GridSearch::new(
            ParameterGrid::new(),
            GridSearchConfig::default().with_fitted_values(true),
        );
        let err = search
            .run::<NaiveMean>(&ramp(10), &Covariates::none(), None)
            .unwrap_err();
        assert!(matches!(err, ForecastError::FittedValuesUnavailable(_)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = ParameterGrid::new().with("window", [1usize, 2, 3, 4, 6, 8]);
        let config = GridSearchConfig::default()
            .with_forecast_horizon(2)
            .with_start(Start::Fraction(0.5))
            .with_metric(Metric::RMSE);
        let series = TimeSeries::from_values((0..40).map(|i| ((i as f64) * 0.7).sin() + 3.0).collect()).unwrap();

        let sequential = GridSearch::new(grid.clone(), config.clone())
            .run::<MovingAverage>(&series, &Covariates::none(), None)
            .unwrap();
        let parallel = GridSearch::new(grid, config.with_parallelism(Parallelism::Threads(3)))
            .run::<MovingAverage>(&series, &Covariates::none(), None)
            .unwrap();
        assert_eq!(sequential.params, parallel.params);
        assert_eq!(sequential.evaluations, parallel.evaluations);
    }

    #[test]
    fn test_jobs_mapping() {
        assert_eq!(Parallelism::from_jobs(-1), Parallelism::All);
        assert_eq!(Parallelism::from_jobs(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_jobs(4), Parallelism::Threads(4));
    }
}
