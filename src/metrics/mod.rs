//! Forecast error metrics.
//!
//! - MAE, MSE, RMSE
//! - MAPE, sMAPE
//! - Reductions over walk-forward iterations (mean, median, max, min, custom)

pub mod error_metrics;
pub mod reduction;

pub use error_metrics::{aligned_pairs, deterministic, Metric, MetricError, MetricFn};
pub use reduction::Reduction;
