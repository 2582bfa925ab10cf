//! Collects per-iteration forecasts into the walk-forward output.

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::series::{SeriesError, TimeSeries};

/// Forecasts produced by a walk-forward run, in prediction-point order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "forecasts", rename_all = "snake_case")]
pub enum HistoricalForecasts {
    /// Last point of every forecast, as one series with frequency `base × stride`.
    LastPoints(TimeSeries),
    /// Every forecast in full.
    Full(Vec<TimeSeries>),
}

impl HistoricalForecasts {
    /// Number of forecasts.
    pub fn len(&self) -> usize {
        match self {
            Self::LastPoints(series) => series.len(),
            Self::Full(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_points(&self) -> Option<&TimeSeries> {
        match self {
            Self::LastPoints(series) => Some(series),
            Self::Full(_) => None,
        }
    }

    pub fn full(&self) -> Option<&[TimeSeries]> {
        match self {
            Self::LastPoints(_) => None,
            Self::Full(list) => Some(list),
        }
    }
}

/// Accumulates forecasts for one run.
#[derive(Debug)]
pub struct ForecastAssembler<'a> {
    series: &'a TimeSeries,
    first_end: usize,
    stride: usize,
    last_points_only: bool,
    forecasts: Vec<TimeSeries>,
    shape: Option<(usize, usize)>,
}

impl<'a> ForecastAssembler<'a> {
    /// `first_end` is the position, on the series index, of the first forecast's last step.
    pub fn new(series: &'a TimeSeries, first_end: usize, stride: usize, last_points_only: bool) -> Self {
        Self {
            series,
            first_end,
            stride,
            last_points_only,
            forecasts: Vec::new(),
            shape: None,
        }
    }

    /// Add the next forecast. Width and sample count must match earlier forecasts.
    pub fn push(&mut self, forecast: TimeSeries) -> Result<()> {
        let shape = (forecast.width(), forecast.n_samples());
        match self.shape {
            Some(expected) if expected != shape => {
                return Err(SeriesError::ShapeMismatch {
                    expected: expected.0 * expected.1,
                    got: shape.0 * shape.1,
                }
                .into());
            }
            None => self.shape = Some(shape),
            _ => {}
        }
        self.forecasts.push(forecast);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.forecasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }

    pub fn finish(self) -> Result<HistoricalForecasts> {
        if !self.last_points_only {
            return Ok(HistoricalForecasts::Full(self.forecasts));
        }

        let first = self.forecasts.first().ok_or_else(|| {
            ForecastError::EmptyForecastRange("no forecast was produced".to_string())
        })?;
        let (_, n_samples) = self.shape.unwrap_or((first.width(), first.n_samples()));

        let index = self
            .series
            .index()
            .strided(self.first_end, self.stride, self.forecasts.len())
            .ok_or_else(|| SeriesError::InvalidIndex(format!("stride {}", self.stride)))?;
        for (i, forecast) in self.forecasts.iter().enumerate() {
            if index.at(i) != Some(forecast.end_time()) {
                return Err(SeriesError::InvalidIndex(format!(
                    "forecast {} ends at {} instead of {}",
                    i,
                    forecast.end_time(),
                    index.at(i).map_or("nothing".to_string(), |t| t.to_string())
                ))
                .into());
            }
        }

        let values = self
            .forecasts
            .iter()
            .flat_map(|f| f.row(f.len() - 1).iter().copied())
            .collect();

        let assembled = TimeSeries::new(index, self.series.columns().to_vec(), n_samples, values)?
            .with_metadata_of(self.series);
        Ok(HistoricalForecasts::LastPoints(assembled))
    }
}
