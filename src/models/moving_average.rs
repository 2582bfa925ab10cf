//! Moving-average model.
//!
//! Forecasts the mean of the last `window` points of whatever series it is asked to
//! continue, so it can be fit once and reused across walk-forward iterations.

use crate::model::{
    ensure_train_length, Covariates, ForecastingModel, FromParams, ModelCapabilities, ModelError,
    ModelParams,
};
use crate::series::TimeSeries;

#[derive(Debug, Clone)]
pub struct MovingAverage {
    params: ModelParams,
    window: usize,
    fitted: bool,
}

impl MovingAverage {
    pub fn new(window: usize) -> Result<Self, ModelError> {
        if window == 0 {
            return Err(ModelError::InvalidParameter {
                name: "window".to_string(),
                reason: "window must be at least 1".to_string(),
            });
        }
        Ok(Self {
            params: ModelParams::new().with("window", window),
            window,
            fitted: false,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl FromParams for MovingAverage {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&["window"])?;
        Self::new(params.usize_or("window", 3)?)
    }
}

impl ForecastingModel for MovingAverage {
    fn name(&self) -> &str {
        "MovingAverage"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            retrain_optional: true,
            ..ModelCapabilities::default()
        }
    }

    fn min_train_length(&self) -> usize {
        self.window
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn fit(&mut self, series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;
        self.fitted = true;
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        series: &TimeSeries,
        _covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted(self.name().to_string()));
        }
        ensure_train_length(self, series)?;

        let recent = series.tail(self.window)?;
        let means: Vec<f64> = (0..recent.width())
            .map(|c| recent.component_values(c).iter().sum::<f64>() / recent.len() as f64)
            .collect();
        let values = (0..n).flat_map(|_| means.iter().copied()).collect();
        Ok(TimeSeries::following(series, n, 1, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecasts_from_input_series() {
        let mut model = MovingAverage::new(2).unwrap();
        let first = TimeSeries::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        model.fit(&first, &Covariates::none()).unwrap();

        let longer = TimeSeries::from_values(vec![1.0, 2.0, 3.0, 5.0, 7.0]).unwrap();
        let forecast = model.predict(2, &longer, &Covariates::none(), 1).unwrap();
        assert_eq!(forecast.component_values(0), vec![6.0, 6.0]);
        assert_eq!(forecast.start_time(), crate::series::Timestamp::Index(5));
    }

    #[test]
    fn test_capabilities() {
        let model = MovingAverage::new(3).unwrap();
        assert!(model.capabilities().retrain_optional);
        assert!(!model.capabilities().fitted_values);
        assert_eq!(model.min_train_length(), 3);
    }

    #[test]
    fn test_from_params_default_window() {
        let model = MovingAverage::from_params(&ModelParams::new()).unwrap();
        assert_eq!(model.window(), 3);
    }
}
