//! Backtesting: historical forecasts scored against the actual series.

use serde::Serialize;
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::metrics::{Metric, Reduction};
use crate::model::{Covariates, ForecastingModel};
use crate::series::TimeSeries;
use crate::walkforward::{HistoricalForecasts, WalkForwardConfig, WalkForwardEngine, WalkForwardOutput};

/// Configuration for backtest execution.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Walk-forward settings used to produce the forecasts.
    pub walk_forward: WalkForwardConfig,
    /// Metrics evaluated on every forecast; must not be empty.
    pub metrics: Vec<Metric>,
    /// Reduction over iterations. `None` keeps the per-iteration matrix.
    pub reduction: Option<Reduction>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            walk_forward: WalkForwardConfig::default().with_last_points_only(false),
            metrics: vec![Metric::MAPE],
            reduction: Some(Reduction::Mean),
        }
    }
}

impl BacktestConfig {
    pub fn with_walk_forward(mut self, walk_forward: WalkForwardConfig) -> Self {
        self.walk_forward = walk_forward;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_reduction(mut self, reduction: Option<Reduction>) -> Self {
        self.reduction = reduction;
        self
    }
}

/// Backtest error score(s).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BacktestScore {
    /// One metric, reduced or computed on the last points.
    Single(f64),
    /// One value per metric.
    PerMetric(Vec<f64>),
    /// Unreduced matrix: one row per forecast, one column per metric.
    PerIteration(Vec<Vec<f64>>),
}

impl BacktestScore {
    /// Score of the first metric, if the score is reduced.
    pub fn first(&self) -> Option<f64> {
        match self {
            Self::Single(v) => Some(*v),
            Self::PerMetric(values) => values.first().copied(),
            Self::PerIteration(_) => None,
        }
    }

    fn from_values(values: Vec<f64>) -> Self {
        if values.len() == 1 {
            Self::Single(values[0])
        } else {
            Self::PerMetric(values)
        }
    }
}

/// Backtest result: the score plus the forecasts it was computed on.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub score: BacktestScore,
    pub output: WalkForwardOutput,
}

/// Scores historical forecasts of a model.
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run historical forecasts and score them.
    pub fn run<M: ForecastingModel + ?Sized>(
        &self,
        model: &mut M,
        series: &TimeSeries,
        covariates: &Covariates,
    ) -> Result<BacktestResult> {
        self.check_metrics()?;
        let engine = WalkForwardEngine::new(self.config.walk_forward.clone());
        let output = engine.run(model, series, covariates)?;
        let score = self.score(series, &output.forecasts)?;
        info!(
            "Backtest of {} over {} forecasts: {:?}",
            model.name(),
            output.forecasts.len(),
            score
        );
        Ok(BacktestResult { score, output })
    }

    /// Score precomputed historical forecasts against `series`.
    pub fn score(&self, series: &TimeSeries, forecasts: &HistoricalForecasts) -> Result<BacktestScore> {
        self.check_metrics()?;
        let metrics = &self.config.metrics;

        match forecasts {
            HistoricalForecasts::LastPoints(predicted) => {
                let values = metrics
                    .iter()
                    .map(|m| m.evaluate(series, predicted))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(BacktestScore::from_values(values))
            }
            HistoricalForecasts::Full(list) => {
                let mut matrix = Vec::with_capacity(list.len());
                for forecast in list {
                    let row = metrics
                        .iter()
                        .map(|m| m.evaluate(series, forecast))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    matrix.push(row);
                }

                match self.config.reduction {
                    None => Ok(BacktestScore::PerIteration(matrix)),
                    Some(reduction) => {
                        let reduced = (0..metrics.len())
                            .map(|j| {
                                let column: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
                                reduction.apply(&column)
                            })
                            .collect();
                        Ok(BacktestScore::from_values(reduced))
                    }
                }
            }
        }
    }

    fn check_metrics(&self) -> Result<()> {
        if self.config.metrics.is_empty() {
            return Err(ForecastError::InvalidParameter {
                name: "metrics",
                reason: "at least one metric is required".to_string(),
            });
        }
        Ok(())
    }
}
