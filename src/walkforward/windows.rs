//! Training and covariate window construction.
//!
//! Fitting never sees information from at or after the prediction point, except future
//! covariates, which are known ahead by definition and extend to the last forecast
//! timestamp. Forecasting additionally gets past covariates up to the last forecast
//! timestamp, as far as the covariate series reaches.

use crate::error::{ForecastError, Result};
use crate::model::{CovariateKind, CovariateSupport, Covariates, ModelCapabilities};
use crate::series::{TimeSeries, Timestamp};

use super::schedule::PredictionPoint;

/// Windows handed to the model for one prediction point.
#[derive(Debug, Clone)]
pub struct TrainingWindows {
    /// Target points strictly before the prediction point.
    pub target: TimeSeries,
    /// Covariates for `fit`: past ones end strictly before the prediction point.
    pub covariates: Covariates,
    /// Covariates for `predict`: both kinds extend to the last forecast timestamp.
    pub forecast_covariates: Covariates,
    /// Last timestamp the forecast covers.
    pub forecast_end: Timestamp,
}

impl TrainingWindows {
    /// Last training timestamp.
    pub fn origin(&self) -> Timestamp {
        self.target.end_time()
    }

    /// Future covariates known at the origin, strictly before `pred_time`.
    pub fn observed_future_covariates(&self, pred_time: Timestamp) -> Result<Option<TimeSeries>> {
        Ok(self
            .covariates
            .future
            .as_ref()
            .map(|cov| cov.drop_after(pred_time))
            .transpose()?)
    }
}

/// Reject covariates the model cannot take and demand the ones it requires.
pub fn check_covariate_support(
    model: &str,
    capabilities: &ModelCapabilities,
    covariates: &Covariates,
) -> Result<()> {
    for kind in [CovariateKind::Past, CovariateKind::Future] {
        let supplied = covariates.get(kind).is_some();
        match capabilities.covariate_support(kind) {
            CovariateSupport::Required if !supplied => {
                return Err(ForecastError::MissingCovariate {
                    kind,
                    model: model.to_string(),
                });
            }
            CovariateSupport::Unsupported if supplied => {
                return Err(ForecastError::UnsupportedCovariate {
                    kind,
                    model: model.to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Builds per-iteration windows for a fixed horizon and optional sliding length.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    train_length: Option<usize>,
    forecast_horizon: usize,
    min_train_length: usize,
}

impl WindowBuilder {
    /// Validates `train_length` against the model minimum.
    pub fn new(
        train_length: Option<usize>,
        forecast_horizon: usize,
        min_train_length: usize,
    ) -> Result<Self> {
        match train_length {
            Some(0) => {
                return Err(ForecastError::InvalidTrainLength(
                    "must be at least 1".to_string(),
                ))
            }
            Some(n) if n < min_train_length => {
                return Err(ForecastError::InvalidTrainLength(format!(
                    "{} is shorter than the model minimum of {}",
                    n, min_train_length
                )))
            }
            _ => {}
        }
        Ok(Self {
            train_length,
            forecast_horizon,
            min_train_length,
        })
    }

    /// Windows for one prediction point.
    pub fn build(
        &self,
        series: &TimeSeries,
        covariates: &Covariates,
        point: &PredictionPoint,
    ) -> Result<TrainingWindows> {
        let available = point.position;
        if available < self.min_train_length.max(1) {
            return Err(ForecastError::InsufficientTrainingData {
                pred_time: point.time,
                required: self.min_train_length.max(1),
                available,
            });
        }

        let length = self.train_length.map_or(available, |n| n.min(available));
        let target = series.slice_positions(available - length, available)?;

        let forecast_end = series
            .index()
            .at(point.position + self.forecast_horizon - 1)
            .ok_or_else(|| {
                ForecastError::EmptyForecastRange(format!(
                    "forecast from {} cannot be represented on the series index",
                    point.time
                ))
            })?;

        let past = covariates
            .past
            .as_ref()
            .map(|cov| past_window(cov, &target, point.time))
            .transpose()?;
        let forecast_past = covariates
            .past
            .as_ref()
            .map(|cov| forecast_past_window(cov, &target, forecast_end))
            .transpose()?;
        let future = covariates
            .future
            .as_ref()
            .map(|cov| future_window(cov, &target, forecast_end))
            .transpose()?;

        Ok(TrainingWindows {
            target,
            covariates: Covariates {
                past,
                future: future.clone(),
            },
            forecast_covariates: Covariates {
                past: forecast_past,
                future,
            },
            forecast_end,
        })
    }
}

/// Past covariate points strictly before the prediction point, covering the training span.
fn past_window(covariate: &TimeSeries, target: &TimeSeries, pred_time: Timestamp) -> Result<TimeSeries> {
    let too_short = || {
        ForecastError::CovariateTooShort(format!(
            "past covariates ({} to {}) must cover the training window {} to {}",
            covariate.start_time(),
            covariate.end_time(),
            target.start_time(),
            target.end_time()
        ))
    };
    let window = covariate.drop_after(pred_time).map_err(|_| too_short())?;
    if window.start_time() > target.start_time() || window.end_time() < target.end_time() {
        return Err(too_short());
    }
    Ok(window)
}

/// Past covariate points up to the last forecast timestamp, covering at least the training span.
///
/// Points the covariate series does not reach are left out; a model that needs them
/// reports the missing timestamp itself.
fn forecast_past_window(
    covariate: &TimeSeries,
    target: &TimeSeries,
    forecast_end: Timestamp,
) -> Result<TimeSeries> {
    let window = covariate.until(forecast_end).map_err(|_| {
        ForecastError::CovariateTooShort(format!(
            "past covariates ({} to {}) start after {}",
            covariate.start_time(),
            covariate.end_time(),
            forecast_end
        ))
    })?;
    if window.start_time() > target.start_time() || window.end_time() < target.end_time() {
        return Err(ForecastError::CovariateTooShort(format!(
            "past covariates ({} to {}) must cover the training window {} to {}",
            covariate.start_time(),
            covariate.end_time(),
            target.start_time(),
            target.end_time()
        )));
    }
    Ok(window)
}

/// Future covariate points up to the last forecast timestamp, covering training and forecast spans.
fn future_window(covariate: &TimeSeries, target: &TimeSeries, forecast_end: Timestamp) -> Result<TimeSeries> {
    let too_short = || {
        ForecastError::CovariateTooShort(format!(
            "future covariates ({} to {}) must cover {} to {}",
            covariate.start_time(),
            covariate.end_time(),
            target.start_time(),
            forecast_end
        ))
    };
    let window = covariate.until(forecast_end).map_err(|_| too_short())?;
    if window.start_time() > target.start_time() || window.end_time() < forecast_end {
        return Err(too_short());
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeIndex;
    use crate::walkforward::schedule::{prediction_points, Start};

    fn series(n: usize) -> TimeSeries {
        TimeSeries::from_values((0..n).map(|i| i as f64).collect()).unwrap()
    }

    fn point(s: &TimeSeries, position: usize) -> PredictionPoint {
        prediction_points(s, Start::Position(position), 1, 1, true).unwrap()[0]
    }

    #[test]
    fn test_expanding_window() {
        let s = series(20);
        let builder = WindowBuilder::new(None, 1, 3).unwrap();
        let windows = builder.build(&s, &Covariates::none(), &point(&s, 12)).unwrap();
        assert_eq!(windows.target.len(), 12);
        assert_eq!(windows.target.start_time(), Timestamp::Index(0));
        assert_eq!(windows.origin(), Timestamp::Index(11));
    }

    #[test]
    fn test_sliding_window() {
        let s = series(60);
        let builder = WindowBuilder::new(Some(10), 1, 3).unwrap();
        let windows = builder.build(&s, &Covariates::none(), &point(&s, 50)).unwrap();
        assert_eq!(windows.target.times().first(), Some(&Timestamp::Index(40)));
        assert_eq!(windows.target.times().last(), Some(&Timestamp::Index(49)));

        // fewer points available than train_length
        let windows = builder.build(&s, &Covariates::none(), &point(&s, 6)).unwrap();
        assert_eq!(windows.target.len(), 6);
    }

    #[test]
    fn test_insufficient_training_data() {
        let s = series(20);
        let builder = WindowBuilder::new(None, 1, 5).unwrap();
        let err = builder.build(&s, &Covariates::none(), &point(&s, 4)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientTrainingData { required: 5, available: 4, .. }
        ));

        // position 0 has nothing to train on even for a model without a minimum
        let builder = WindowBuilder::new(None, 1, 0).unwrap();
        assert!(builder.build(&s, &Covariates::none(), &point(&s, 0)).is_err());
    }

    #[test]
    fn test_invalid_train_length() {
        assert!(matches!(
            WindowBuilder::new(Some(0), 1, 1),
            Err(ForecastError::InvalidTrainLength(_))
        ));
        assert!(matches!(
            WindowBuilder::new(Some(2), 1, 3),
            Err(ForecastError::InvalidTrainLength(_))
        ));
    }

    #[test]
    fn test_covariate_windows_are_causal() {
        let s = series(30);
        let cov = series(40);
        let covariates = Covariates::none().with_past(cov.clone()).with_future(cov);
        let builder = WindowBuilder::new(None, 3, 3).unwrap();
        let windows = builder.build(&s, &covariates, &point(&s, 20)).unwrap();

        let past = windows.covariates.past.as_ref().unwrap();
        assert_eq!(past.end_time(), Timestamp::Index(19));
        let future = windows.covariates.future.as_ref().unwrap();
        assert_eq!(future.end_time(), Timestamp::Index(22));
        assert_eq!(windows.forecast_end, Timestamp::Index(22));

        // forecasting sees past covariates through the horizon
        let forecast_past = windows.forecast_covariates.past.as_ref().unwrap();
        assert_eq!(forecast_past.end_time(), Timestamp::Index(22));
        assert_eq!(windows.forecast_covariates.future.as_ref().unwrap().end_time(), Timestamp::Index(22));

        let observed = windows.observed_future_covariates(Timestamp::Index(20)).unwrap().unwrap();
        assert_eq!(observed.end_time(), Timestamp::Index(19));
    }

    #[test]
    fn test_forecast_past_window_stops_at_covariate_end() {
        let s = series(30);
        // past covariates end with the target, two steps short of the forecast end
        let covariates = Covariates::none().with_past(series(30));
        let builder = WindowBuilder::new(None, 3, 3).unwrap();
        let windows = builder.build(&s, &covariates, &point(&s, 27)).unwrap();
        assert_eq!(windows.covariates.past.as_ref().unwrap().end_time(), Timestamp::Index(26));
        assert_eq!(
            windows.forecast_covariates.past.as_ref().unwrap().end_time(),
            Timestamp::Index(29)
        );

        let windows = builder.build(&s, &covariates, &point(&s, 29)).unwrap();
        assert_eq!(
            windows.forecast_covariates.past.as_ref().unwrap().end_time(),
            Timestamp::Index(29)
        );
    }

    #[test]
    fn test_covariate_too_short() {
        let s = series(30);
        // future covariates end at 21 but the forecast reaches 22
        let cov = TimeSeries::univariate(TimeIndex::range(0, 1, 22).unwrap(), vec![0.0; 22]).unwrap();
        let builder = WindowBuilder::new(None, 3, 3).unwrap();
        let err = builder
            .build(&s, &Covariates::none().with_future(cov.clone()), &point(&s, 20))
            .unwrap_err();
        assert!(matches!(err, ForecastError::CovariateTooShort(_)));

        // past covariates starting after the training window start
        let late = TimeSeries::univariate(TimeIndex::range(5, 1, 25).unwrap(), vec![0.0; 25]).unwrap();
        let err = builder
            .build(&s, &Covariates::none().with_past(late), &point(&s, 20))
            .unwrap_err();
        assert!(matches!(err, ForecastError::CovariateTooShort(_)));
    }

    #[test]
    fn test_covariate_support_checks() {
        let caps = ModelCapabilities {
            past_covariates: CovariateSupport::Required,
            ..ModelCapabilities::default()
        };
        let err = check_covariate_support("m", &caps, &Covariates::none()).unwrap_err();
        assert!(matches!(err, ForecastError::MissingCovariate { kind: CovariateKind::Past, .. }));

        let covariates = Covariates::none().with_past(series(5)).with_future(series(5));
        let err = check_covariate_support("m", &caps, &covariates).unwrap_err();
        assert!(matches!(err, ForecastError::UnsupportedCovariate { kind: CovariateKind::Future, .. }));
    }
}
