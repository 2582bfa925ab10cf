//! Prediction-point generation.
//!
//! A prediction point is the first timestamp a forecast covers. The training window
//! of a point holds the series points strictly before it.

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::series::{TimeSeries, Timestamp};

/// Where the first forecast starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Start {
    /// Fraction of the series length in `[0, 1]`, rounded down to a position.
    Fraction(f64),
    /// Position in the series.
    Position(usize),
    /// A timestamp of the series.
    Time(Timestamp),
}

impl Default for Start {
    fn default() -> Self {
        Self::Fraction(0.5)
    }
}

impl Start {
    /// Resolve to a position of `series`.
    pub fn resolve(&self, series: &TimeSeries) -> Result<usize> {
        let len = series.len();
        match *self {
            Self::Fraction(f) => {
                if !(0.0..=1.0).contains(&f) {
                    return Err(ForecastError::InvalidStart(format!(
                        "fraction {} is outside [0, 1]",
                        f
                    )));
                }
                let position = (f * len as f64).floor() as usize;
                if position >= len {
                    return Err(ForecastError::InvalidStart(format!(
                        "fraction {} leaves no point to forecast in a series of length {}",
                        f, len
                    )));
                }
                Ok(position)
            }
            Self::Position(i) => {
                if i >= len {
                    return Err(ForecastError::InvalidStart(format!(
                        "position {} is outside a series of length {}",
                        i, len
                    )));
                }
                Ok(i)
            }
            Self::Time(ts) => series.position_of(ts).ok_or_else(|| {
                ForecastError::InvalidStart(format!(
                    "{} is not a timestamp of the series ({} to {})",
                    ts,
                    series.start_time(),
                    series.end_time()
                ))
            }),
        }
    }
}

/// One scheduled forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionPoint {
    /// Zero-based iteration number.
    pub iteration: usize,
    /// Position of the first forecast timestamp in the series.
    pub position: usize,
    pub time: Timestamp,
}

/// Prediction points for a walk-forward run, strictly increasing.
///
/// Without `overlap_end` the last forecast ends exactly at or before the series end.
/// With it, forecasts may extend past the end as long as they start inside the series.
pub fn prediction_points(
    series: &TimeSeries,
    start: Start,
    forecast_horizon: usize,
    stride: usize,
    overlap_end: bool,
) -> Result<Vec<PredictionPoint>> {
    if forecast_horizon == 0 {
        return Err(ForecastError::InvalidParameter {
            name: "forecast_horizon",
            reason: "must be at least 1".to_string(),
        });
    }
    if stride == 0 {
        return Err(ForecastError::InvalidParameter {
            name: "stride",
            reason: "must be at least 1".to_string(),
        });
    }

    let len = series.len();
    let first = start.resolve(series)?;
    let last = if overlap_end {
        len - 1
    } else if forecast_horizon > len {
        return Err(ForecastError::EmptyForecastRange(format!(
            "horizon {} exceeds the series length {}",
            forecast_horizon, len
        )));
    } else {
        len - forecast_horizon
    };

    if first > last {
        return Err(ForecastError::EmptyForecastRange(format!(
            "start {} is after the last admissible prediction point {} (horizon {})",
            series.time_at(first).unwrap_or(Timestamp::Index(first as i64)),
            series.time_at(last).unwrap_or(Timestamp::Index(last as i64)),
            forecast_horizon
        )));
    }

    let points = (first..=last)
        .step_by(stride)
        .enumerate()
        .filter_map(|(iteration, position)| {
            series.time_at(position).map(|time| PredictionPoint {
                iteration,
                position,
                time,
            })
        })
        .collect::<Vec<_>>();

    if points.is_empty() {
        return Err(ForecastError::EmptyForecastRange(
            "no prediction point could be scheduled".to_string(),
        ));
    }
    Ok(points)
}
