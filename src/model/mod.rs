//! Forecasting model contract.
//!
//! Models declare what they can do through `ModelCapabilities` instead of belonging to
//! a "local" / "global" / "future covariates" hierarchy; the walk-forward engine checks
//! these capabilities before the first iteration.

pub mod params;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::{SeriesError, TimeSeries, Timestamp};

pub use params::{ModelParams, ParamValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model {0} must be fit before calling predict")]
    NotFitted(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Train series only contains {got} points but {model} requires at least {required}")]
    TooShort {
        model: String,
        required: usize,
        got: usize,
    },

    #[error("{model} has no {kind} covariate value at {time}")]
    CovariateMissing {
        model: String,
        kind: CovariateKind,
        time: Timestamp,
    },

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Which covariate slot a series fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovariateKind {
    Past,
    Future,
}

impl fmt::Display for CovariateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Past => write!(f, "past"),
            Self::Future => write!(f, "future"),
        }
    }
}

/// How a model treats one kind of covariate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovariateSupport {
    #[default]
    Unsupported,
    Optional,
    Required,
}

impl CovariateSupport {
    pub fn accepts(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Capability tags declared by a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Past-observed covariates.
    pub past_covariates: CovariateSupport,
    /// Future-known covariates.
    pub future_covariates: CovariateSupport,
    /// The model can forecast from a new input series without being refit.
    pub retrain_optional: bool,
    /// In-sample fitted values are available after `fit`.
    pub fitted_values: bool,
    /// `predict` honours `num_samples > 1`.
    pub probabilistic: bool,
}

impl ModelCapabilities {
    pub fn covariate_support(&self, kind: CovariateKind) -> CovariateSupport {
        match kind {
            CovariateKind::Past => self.past_covariates,
            CovariateKind::Future => self.future_covariates,
        }
    }
}

/// Covariate series handed to `fit` / `predict`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Covariates {
    pub past: Option<TimeSeries>,
    pub future: Option<TimeSeries>,
}

impl Covariates {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_past(mut self, series: TimeSeries) -> Self {
        self.past = Some(series);
        self
    }

    pub fn with_future(mut self, series: TimeSeries) -> Self {
        self.future = Some(series);
        self
    }

    pub fn get(&self, kind: CovariateKind) -> Option<&TimeSeries> {
        match kind {
            CovariateKind::Past => self.past.as_ref(),
            CovariateKind::Future => self.future.as_ref(),
        }
    }
}

/// Common interface for all forecasting models.
///
/// Object safe; the engine accepts `&mut dyn ForecastingModel` as well as concrete types.
pub trait ForecastingModel: Send {
    /// Model name used in logs and errors.
    fn name(&self) -> &str;

    /// The configuration record the model was built from.
    fn params(&self) -> &ModelParams;

    fn capabilities(&self) -> ModelCapabilities;

    /// Minimum number of points a training series must contain.
    fn min_train_length(&self) -> usize {
        3
    }

    fn is_fitted(&self) -> bool;

    /// Fit the model on `series`.
    fn fit(&mut self, series: &TimeSeries, covariates: &Covariates) -> Result<(), ModelError>;

    /// Forecast `n` steps after the end of `series`.
    ///
    /// Models that cannot skip retraining always receive the series they were fit on.
    fn predict(
        &self,
        n: usize,
        series: &TimeSeries,
        covariates: &Covariates,
        num_samples: usize,
    ) -> Result<TimeSeries, ModelError>;

    /// In-sample fitted values of the last `fit`, if the model exposes them.
    fn fitted_values(&self) -> Option<TimeSeries> {
        None
    }
}

impl<M: ForecastingModel + ?Sized> ForecastingModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn params(&self) -> &ModelParams {
        (**self).params()
    }

    fn capabilities(&self) -> ModelCapabilities {
        (**self).capabilities()
    }

    fn min_train_length(&self) -> usize {
        (**self).min_train_length()
    }

    fn is_fitted(&self) -> bool {
        (**self).is_fitted()
    }

    fn fit(&mut self, series: &TimeSeries, covariates: &Covariates) -> Result<(), ModelError> {
        (**self).fit(series, covariates)
    }

    fn predict(
        &self,
        n: usize,
        series: &TimeSeries,
        covariates: &Covariates,
        num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        (**self).predict(n, series, covariates, num_samples)
    }

    fn fitted_values(&self) -> Option<TimeSeries> {
        (**self).fitted_values()
    }
}

/// Construction from a configuration record.
pub trait FromParams: Sized {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError>;
}

/// A fresh, unfitted copy of `model` built from its configuration record.
pub fn untrained<M: ForecastingModel + FromParams>(model: &M) -> Result<M, ModelError> {
    M::from_params(model.params())
}

/// Reject training series shorter than the model minimum.
pub(crate) fn ensure_train_length(
    model: &dyn ForecastingModel,
    series: &TimeSeries,
) -> Result<(), ModelError> {
    if series.len() < model.min_train_length() {
        return Err(ModelError::TooShort {
            model: model.name().to_string(),
            required: model.min_train_length(),
            got: series.len(),
        });
    }
    Ok(())
}
