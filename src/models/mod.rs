//! Baseline forecasting models.
//!
//! - Naive mean / seasonal / drift (local)
//! - Moving average (reusable without refitting)
//! - Simple exponential smoothing (exposes fitted values)
//! - Linear regression on lags and covariates

pub mod moving_average;
pub mod naive;
pub mod regression;
pub mod smoothing;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{ForecastingModel, FromParams, ModelError, ModelParams};

pub use moving_average::MovingAverage;
pub use naive::{NaiveDrift, NaiveMean, NaiveSeasonal};
pub use regression::LinearRegressionModel;
pub use smoothing::ExponentialSmoothing;

/// Registry of the built-in models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    NaiveMean,
    NaiveSeasonal,
    NaiveDrift,
    MovingAverage,
    ExponentialSmoothing,
    LinearRegression,
}

impl ModelKind {
    /// Build a boxed model of this kind from its parameters.
    pub fn build(&self, params: &ModelParams) -> Result<Box<dyn ForecastingModel>, ModelError> {
        Ok(match self {
            Self::NaiveMean => Box::new(NaiveMean::from_params(params)?),
            Self::NaiveSeasonal => Box::new(NaiveSeasonal::from_params(params)?),
            Self::NaiveDrift => Box::new(NaiveDrift::from_params(params)?),
            Self::MovingAverage => Box::new(MovingAverage::from_params(params)?),
            Self::ExponentialSmoothing => Box::new(ExponentialSmoothing::from_params(params)?),
            Self::LinearRegression => Box::new(LinearRegressionModel::from_params(params)?),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NaiveMean => "naive_mean",
            Self::NaiveSeasonal => "naive_seasonal",
            Self::NaiveDrift => "naive_drift",
            Self::MovingAverage => "moving_average",
            Self::ExponentialSmoothing => "exponential_smoothing",
            Self::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "naive_mean" => Ok(Self::NaiveMean),
            "naive_seasonal" => Ok(Self::NaiveSeasonal),
            "naive_drift" => Ok(Self::NaiveDrift),
            "moving_average" => Ok(Self::MovingAverage),
            "exponential_smoothing" => Ok(Self::ExponentialSmoothing),
            "linear_regression" => Ok(Self::LinearRegression),
            other => Err(ModelError::InvalidParameter {
                name: "kind".to_string(),
                reason: format!("unknown model kind `{}`", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_kind() {
        let params = ModelParams::new().with("window", 4usize);
        let model = ModelKind::MovingAverage.build(&params).unwrap();
        assert_eq!(model.name(), "MovingAverage");
        assert_eq!(model.min_train_length(), 4);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("naive-drift".parse::<ModelKind>().unwrap(), ModelKind::NaiveDrift);
        assert_eq!("LINEAR_REGRESSION".parse::<ModelKind>().unwrap(), ModelKind::LinearRegression);
        assert!("arima".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_untrained_copy_keeps_params() {
        let model = ExponentialSmoothing::new(0.3).unwrap();
        let copy = crate::model::untrained(&model).unwrap();
        assert_eq!(copy.params(), model.params());
        assert!(!copy.is_fitted());
    }
}
