//! Walk-forward forecast driver.
//!
//! Runs the loop over prediction points:
//! 1. Build the training and covariate windows
//! 2. Decide whether to refit and fit if so
//! 3. Forecast `forecast_horizon` steps from the training window
//! 4. Hand the forecast to the assembler
//!
//! Iterations run strictly in order; only this loop mutates the model.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ForecastError, Result};
use crate::model::{Covariates, ForecastingModel};
use crate::series::{TimeSeries, Timestamp};

use super::assembler::{ForecastAssembler, HistoricalForecasts};
use super::retrain::{RetrainContext, RetrainPolicy};
use super::schedule::{prediction_points, Start};
use super::windows::{check_covariate_support, WindowBuilder};

/// Configuration for a walk-forward run.
#[derive(Debug, Clone)]
pub struct WalkForwardConfig {
    /// First prediction point.
    pub start: Start,
    /// Steps forecast at every prediction point.
    pub forecast_horizon: usize,
    /// Positions between consecutive prediction points.
    pub stride: usize,
    pub retrain: RetrainPolicy,
    /// Allow forecasts to extend past the end of the series.
    pub overlap_end: bool,
    /// Keep only the last point of every forecast.
    pub last_points_only: bool,
    /// Sliding training window length; expanding window when `None`.
    pub train_length: Option<usize>,
    /// Samples drawn per forecast (probabilistic models only).
    pub num_samples: usize,
    /// Show a progress bar.
    pub verbose: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            start: Start::default(),
            forecast_horizon: 1,
            stride: 1,
            retrain: RetrainPolicy::Always,
            overlap_end: false,
            last_points_only: true,
            train_length: None,
            num_samples: 1,
            verbose: false,
        }
    }
}

impl WalkForwardConfig {
    pub fn with_start(mut self, start: Start) -> Self {
        self.start = start;
        self
    }

    pub fn with_forecast_horizon(mut self, horizon: usize) -> Self {
        self.forecast_horizon = horizon;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_retrain(mut self, retrain: impl Into<RetrainPolicy>) -> Self {
        self.retrain = retrain.into();
        self
    }

    pub fn with_overlap_end(mut self, overlap_end: bool) -> Self {
        self.overlap_end = overlap_end;
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

    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result of a walk-forward run.
#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardOutput {
    pub forecasts: HistoricalForecasts,
    /// Prediction points in iteration order.
    pub prediction_times: Vec<Timestamp>,
    /// Iterations at which the model was refit.
    pub refit_iterations: Vec<usize>,
}

/// Drives a model through historical forecasts.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardEngine {
    config: WalkForwardConfig,
}

impl WalkForwardEngine {
    pub fn new(config: WalkForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Produce historical forecasts of `model` over `series`.
    ///
    /// Configuration is validated before the model is touched. A model that has never
    /// been fit is fit at the first iteration whatever the retrain policy.
    pub fn run<M: ForecastingModel + ?Sized>(
        &self,
        model: &mut M,
        series: &TimeSeries,
        covariates: &Covariates,
    ) -> Result<WalkForwardOutput> {
        let config = &self.config;
        let capabilities = model.capabilities();
        let name = model.name().to_string();

        if config.num_samples == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "num_samples",
                reason: "must be at least 1".to_string(),
            });
        }
        if config.num_samples > 1 && !capabilities.probabilistic {
            return Err(ForecastError::InvalidParameter {
                name: "num_samples",
                reason: format!("{} is deterministic; num_samples must be 1", name),
            });
        }
        check_covariate_support(&name, &capabilities, covariates)?;
        config.retrain.validate(&name, &capabilities)?;
        let windows = WindowBuilder::new(
            config.train_length,
            config.forecast_horizon,
            model.min_train_length(),
        )?;

        let points = prediction_points(
            series,
            config.start,
            config.forecast_horizon,
            config.stride,
            config.overlap_end,
        )?;

        info!(
            "Walk-forward {}: {} prediction points from {} (horizon {}, stride {})",
            name,
            points.len(),
            points[0].time,
            config.forecast_horizon,
            config.stride
        );

        let progress = config.verbose.then(|| {
            let pb = ProgressBar::new(points.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_message(name.clone());
            pb
        });

        let first_end = points[0].position + config.forecast_horizon - 1;
        let mut assembler =
            ForecastAssembler::new(series, first_end, config.stride, config.last_points_only);
        let predicate_wants_future = matches!(
            &config.retrain,
            RetrainPolicy::Predicate(p) if p.wants_future_covariates()
        );
        let mut refit_iterations = Vec::new();

        for point in &points {
            let window = windows.build(series, covariates, point)?;

            let observed_future = if predicate_wants_future {
                window.observed_future_covariates(point.time)?
            } else {
                None
            };
            let ctx = RetrainContext {
                iteration: point.iteration,
                prediction_time: point.time,
                train_series: &window.target,
                past_covariates: window.covariates.past.as_ref(),
                future_covariates: observed_future.as_ref(),
            };
            let refit = config.retrain.should_retrain(&ctx, model.is_fitted());
            if refit {
                model.fit(&window.target, &window.covariates)?;
                refit_iterations.push(point.iteration);
            }

            let forecast = model.predict(
                config.forecast_horizon,
                &window.target,
                &window.forecast_covariates,
                config.num_samples,
            )?;
            if forecast.len() < config.forecast_horizon {
                return Err(ForecastError::ShortForecast {
                    expected: config.forecast_horizon,
                    got: forecast.len(),
                });
            }
            let forecast = if forecast.len() > config.forecast_horizon {
                forecast.head(config.forecast_horizon)?
            } else {
                forecast
            };

            debug!(
                "Iteration {}: prediction at {}, train {} points ending {}, refit = {}",
                point.iteration,
                point.time,
                window.target.len(),
                window.origin(),
                refit
            );

            assembler.push(forecast)?;
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        info!(
            "Walk-forward {} complete: {} forecasts, {} refits",
            name,
            assembler.len(),
            refit_iterations.len()
        );

        Ok(WalkForwardOutput {
            forecasts: assembler.finish()?,
            prediction_times: points.iter().map(|p| p.time).collect(),
            refit_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovingAverage, NaiveMean, NaiveSeasonal};
    use crate::series::Frequency;

    fn series(n: usize) -> TimeSeries {
        TimeSeries::from_values((0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn test_naive_last_value_forecasts() {
        let s = series(10);
        let mut model = NaiveSeasonal::new(1).unwrap();
        let engine = WalkForwardEngine::new(
            WalkForwardConfig::default().with_start(Start::Position(5)),
        );
        let out = engine.run(&mut model, &s, &Covariates::none()).unwrap();
        let last = out.forecasts.last_points().unwrap();
        // forecast at t is the value at t - 1
        assert_eq!(last.component_values(0), vec![4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(last.start_time(), Timestamp::Index(5));
        assert_eq!(out.refit_iterations, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stride_scales_output_frequency() {
        let s = series(30);
        let mut model = NaiveMean::default();
        let engine = WalkForwardEngine::new(
            WalkForwardConfig::default()
                .with_start(Start::Position(10))
                .with_forecast_horizon(2)
                .with_stride(4),
        );
        let out = engine.run(&mut model, &s, &Covariates::none()).unwrap();
        let last = out.forecasts.last_points().unwrap();
        assert_eq!(last.len(), out.prediction_times.len());
        assert_eq!(last.freq(), Frequency::Steps(4));
        assert_eq!(last.start_time(), Timestamp::Index(11));
    }

    #[test]
    fn test_local_model_rejects_never() {
        let s = series(10);
        let mut model = NaiveMean::default();
        let engine = WalkForwardEngine::new(
            WalkForwardConfig::default()
                .with_start(Start::Position(5))
                .with_retrain(RetrainPolicy::Never),
        );
        let err = engine.run(&mut model, &s, &Covariates::none()).unwrap_err();
        assert!(matches!(err, ForecastError::RetrainRequired(_)));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_never_fits_once() {
        let s = series(20);
        let mut model = MovingAverage::new(3).unwrap();
        let engine = WalkForwardEngine::new(
            WalkForwardConfig::default()
                .with_start(Start::Position(10))
                .with_retrain(false),
        );
        let out = engine.run(&mut model, &s, &Covariates::none()).unwrap();
        assert_eq!(out.refit_iterations, vec![0]);
        // mean of the three points before each prediction point
        let last = out.forecasts.last_points().unwrap();
        assert_eq!(last.value(0, 0), 8.0);
    }

    #[test]
    fn test_deterministic_model_rejects_samples() {
        let s = series(10);
        let mut model = NaiveMean::default();
        let engine = WalkForwardEngine::new(
            WalkForwardConfig::default()
                .with_start(Start::Position(5))
                .with_num_samples(100),
        );
        let err = engine.run(&mut model, &s, &Covariates::none()).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { name: "num_samples", .. }));
    }

    #[test]
    fn test_insufficient_data_at_first_point() {
        let s = series(10);
        let mut model = MovingAverage::new(5).unwrap();
        let engine = WalkForwardEngine::new(WalkForwardConfig::default().with_start(Start::Position(2)));
        let err = engine.run(&mut model, &s, &Covariates::none()).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientTrainingData { required: 5, available: 2, .. }
        ));
    }
}
