//! Forecast error metrics.
//!
//! Every metric compares an actual and a predicted series over their common
//! timestamps, averaging over all matched points and components. Stochastic inputs are
//! reduced to their per-point median first.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::series::{SeriesError, TimeSeries};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Actual and predicted series have no common timestamps")]
    NoOverlap,

    #[error("Width mismatch: actual has {actual} components, predicted has {predicted}")]
    WidthMismatch { actual: usize, predicted: usize },

    #[error("{metric} is undefined when {reason}")]
    Undefined { metric: &'static str, reason: &'static str },

    #[error("Unknown metric `{0}`")]
    Unknown(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

pub type MetricFn = fn(&TimeSeries, &TimeSeries) -> Result<f64, MetricError>;

/// A named error metric. Lower is better.
#[derive(Clone, Copy)]
pub struct Metric {
    name: &'static str,
    func: MetricFn,
}

impl Metric {
    pub const MAE: Metric = Metric { name: "mae", func: mae };
    pub const MSE: Metric = Metric { name: "mse", func: mse };
    pub const RMSE: Metric = Metric { name: "rmse", func: rmse };
    pub const MAPE: Metric = Metric { name: "mape", func: mape };
    pub const SMAPE: Metric = Metric { name: "smape", func: smape };

    /// Wrap a custom metric function.
    pub const fn new(name: &'static str, func: MetricFn) -> Self {
        Self { name, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Error of `predicted` against `actual`.
    pub fn evaluate(&self, actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
        (self.func)(actual, predicted)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.name).finish()
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl FromStr for Metric {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mae" => Ok(Self::MAE),
            "mse" => Ok(Self::MSE),
            "rmse" => Ok(Self::RMSE),
            "mape" => Ok(Self::MAPE),
            "smape" => Ok(Self::SMAPE),
            other => Err(MetricError::Unknown(other.to_string())),
        }
    }
}

/// Deterministic view of a series, taking the median of stochastic samples.
pub fn deterministic(series: &TimeSeries, role: &str) -> TimeSeries {
    if series.is_stochastic() {
        warn!(
            "{} series has {} samples; using the per-point median",
            role,
            series.n_samples()
        );
        series.median_over_samples()
    } else {
        series.clone()
    }
}

/// (actual, predicted) value pairs over the common timestamps.
pub fn aligned_pairs(actual: &TimeSeries, predicted: &TimeSeries) -> Result<Vec<(f64, f64)>, MetricError> {
    if actual.width() != predicted.width() {
        return Err(MetricError::WidthMismatch {
            actual: actual.width(),
            predicted: predicted.width(),
        });
    }
    let actual = deterministic(actual, "actual");
    let predicted = deterministic(predicted, "predicted");

    let mut pairs = Vec::new();
    for (i, ts) in predicted.index().iter().enumerate() {
        if let Some(pos) = actual.position_of(ts) {
            for c in 0..actual.width() {
                pairs.push((actual.value(pos, c), predicted.value(i, c)));
            }
        }
    }
    if pairs.is_empty() {
        return Err(MetricError::NoOverlap);
    }
    Ok(pairs)
}

fn mean_of(pairs: &[(f64, f64)], f: impl Fn(f64, f64) -> f64) -> f64 {
    pairs.iter().map(|&(a, p)| f(a, p)).sum::<f64>() / pairs.len() as f64
}

/// Mean absolute error.
pub fn mae(actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
    let pairs = aligned_pairs(actual, predicted)?;
    Ok(mean_of(&pairs, |a, p| (a - p).abs()))
}

/// Mean squared error.
pub fn mse(actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
    let pairs = aligned_pairs(actual, predicted)?;
    Ok(mean_of(&pairs, |a, p| (a - p).powi(2)))
}

/// Root mean squared error.
pub fn rmse(actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
    mse(actual, predicted).map(f64::sqrt)
}

/// Mean absolute percentage error, in percent.
pub fn mape(actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
    let pairs = aligned_pairs(actual, predicted)?;
    if pairs.iter().any(|&(a, _)| a == 0.0) {
        return Err(MetricError::Undefined {
            metric: "MAPE",
            reason: "the actual series contains zeros",
        });
    }
    Ok(100.0 * mean_of(&pairs, |a, p| ((a - p) / a).abs()))
}

/// Symmetric mean absolute percentage error, in percent (0..=200).
pub fn smape(actual: &TimeSeries, predicted: &TimeSeries) -> Result<f64, MetricError> {
    let pairs = aligned_pairs(actual, predicted)?;
    if pairs.iter().any(|&(a, p)| a.abs() + p.abs() == 0.0) {
        return Err(MetricError::Undefined {
            metric: "sMAPE",
            reason: "actual and predicted are both zero at some point",
        });
    }
    Ok(100.0 * mean_of(&pairs, |a, p| 2.0 * (a - p).abs() / (a.abs() + p.abs())))
}
