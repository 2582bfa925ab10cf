//! Crate-level error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::data::LoaderError;
use crate::metrics::MetricError;
use crate::model::{CovariateKind, ModelError};
use crate::series::{SeriesError, Timestamp};

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid start: {0}")]
    InvalidStart(String),

    #[error("Empty forecast range: {0}")]
    EmptyForecastRange(String),

    #[error(
        "Insufficient training data for prediction at {pred_time}: \
         {available} points available, at least {required} required"
    )]
    InsufficientTrainingData {
        pred_time: Timestamp,
        required: usize,
        available: usize,
    },

    #[error("Covariate series too short: {0}")]
    CovariateTooShort(String),

    #[error("Model {model} requires {kind} covariates but none were given")]
    MissingCovariate { kind: CovariateKind, model: String },

    #[error("Model {model} does not support {kind} covariates")]
    UnsupportedCovariate { kind: CovariateKind, model: String },

    #[error("Invalid retrain policy: {0}")]
    InvalidRetrain(String),

    #[error("Model {0} cannot forecast without retraining; use an always-retrain policy")]
    RetrainRequired(String),

    #[error("Invalid train_length: {0}")]
    InvalidTrainLength(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(
        "Exactly one of forecast_horizon, validation series or fitted values must be \
         selected, got {0}"
    )]
    SearchModeConflict(usize),

    #[error("Invalid sample size: {0}")]
    InvalidSampleSize(String),

    #[error("Model {0} does not expose fitted values")]
    FittedValuesUnavailable(String),

    #[error("No parameter combination produced a valid score")]
    NoValidCombination,

    #[error("Model returned a forecast of {got} points, expected {expected}")]
    ShortForecast { expected: usize, got: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Data error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Errors caused by the caller's setup, raised before any model is fit.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidStart(_)
                | Self::InvalidRetrain(_)
                | Self::RetrainRequired(_)
                | Self::SearchModeConflict(_)
                | Self::MissingCovariate { .. }
                | Self::UnsupportedCovariate { .. }
                | Self::InvalidTrainLength(_)
                | Self::InvalidParameter { .. }
                | Self::InvalidSampleSize(_)
                | Self::FittedValuesUnavailable(_)
                | Self::Config(_)
        )
    }

    /// Errors caused by a series too short for the requested evaluation.
    pub fn is_data_insufficiency(&self) -> bool {
        matches!(
            self,
            Self::InsufficientTrainingData { .. } | Self::CovariateTooShort(_) | Self::EmptyForecastRange(_)
        )
    }
}
