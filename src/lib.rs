//! Walk-forward evaluation of forecasting models.
//!
//! - `walkforward`: historical forecasts without look-ahead
//! - `backtest`: error scores and residuals of historical forecasts
//! - `search`: hyperparameter grid search
//! - `series`, `model`, `models`, `metrics`: the pieces they operate on

pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod models;
pub mod search;
pub mod series;
pub mod walkforward;

// Re-export commonly used types
pub use backtest::{residuals, BacktestConfig, BacktestResult, BacktestScore, Backtester};
pub use config::{AppConfig, ConfigError};
pub use data::{LoaderError, SeriesLoader};
pub use error::{ForecastError, Result};
pub use metrics::{Metric, MetricError, Reduction};
pub use model::{
    Covariates, CovariateKind, CovariateSupport, ForecastingModel, FromParams, ModelCapabilities,
    ModelError, ModelParams, ParamValue,
};
pub use models::ModelKind;
pub use search::{GridSearch, GridSearchConfig, GridSearchResult, Parallelism, ParameterGrid, SampleSize};
pub use series::{Frequency, SeriesError, TimeIndex, TimeSeries, Timestamp};
pub use walkforward::{
    HistoricalForecasts, RetrainPolicy, RetrainPredicate, Start, WalkForwardConfig,
    WalkForwardEngine, WalkForwardOutput,
};
