//! Naive baseline models.
//!
//! Local models: each forecasts from the series it was last fit on and therefore has
//! to be refit before every walk-forward iteration.

use crate::model::{
    ensure_train_length, Covariates, ForecastingModel, FromParams, ModelCapabilities, ModelError,
    ModelParams,
};
use crate::series::TimeSeries;

fn fitted_series<'a>(name: &str, training: &'a Option<TimeSeries>) -> Result<&'a TimeSeries, ModelError> {
    training
        .as_ref()
        .ok_or_else(|| ModelError::NotFitted(name.to_string()))
}

/// Forecasts the mean of each component of the training series.
#[derive(Debug, Clone)]
pub struct NaiveMean {
    params: ModelParams,
    means: Vec<f64>,
    training: Option<TimeSeries>,
}

impl NaiveMean {
    pub fn new() -> Self {
        Self {
            params: ModelParams::new(),
            means: Vec::new(),
            training: None,
        }
    }
}

impl Default for NaiveMean {
    fn default() -> Self {
        Self::new()
    }
}

impl FromParams for NaiveMean {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&[])?;
        Ok(Self::new())
    }
}

impl ForecastingModel for NaiveMean {
    fn name(&self) -> &str {
        "NaiveMean"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::default()
    }

    fn min_train_length(&self) -> usize {
        1
    }

    fn is_fitted(&self) -> bool {
        self.training.is_some()
    }

    fn fit(&mut self, series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;
        self.means = (0..series.width())
            .map(|c| {
                let values = series.component_values(c);
                values.iter().sum::<f64>() / values.len() as f64
            })
            .collect();
        self.training = Some(series.clone());
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        _series: &TimeSeries,
        _covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        let training = fitted_series(self.name(), &self.training)?;
        let values = (0..n).flat_map(|_| self.means.iter().copied()).collect();
        Ok(TimeSeries::following(training, n, 1, values)?)
    }
}

/// Repeats the last `k` observed values. `k = 1` is the naive last-value forecast.
#[derive(Debug, Clone)]
pub struct NaiveSeasonal {
    params: ModelParams,
    k: usize,
    training: Option<TimeSeries>,
}

impl NaiveSeasonal {
    pub fn new(k: usize) -> Result<Self, ModelError> {
        if k == 0 {
            return Err(ModelError::InvalidParameter {
                name: "k".to_string(),
                reason: "season length must be at least 1".to_string(),
            });
        }
        Ok(Self {
            params: ModelParams::new().with("k", k),
            k,
            training: None,
        })
    }
}

impl FromParams for NaiveSeasonal {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&["k"])?;
        Self::new(params.usize_or("k", 1)?)
    }
}

impl ForecastingModel for NaiveSeasonal {
    fn name(&self) -> &str {
        "NaiveSeasonal"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::default()
    }

    fn min_train_length(&self) -> usize {
        self.k
    }

    fn is_fitted(&self) -> bool {
        self.training.is_some()
    }

    fn fit(&mut self, series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;
        self.training = Some(series.clone());
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        _series: &TimeSeries,
        _covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        let training = fitted_series(self.name(), &self.training)?;
        let season_start = training.len() - self.k;
        let mut values = Vec::with_capacity(n * training.width());
        for step in 0..n {
            let pos = season_start + step % self.k;
            values.extend((0..training.width()).map(|c| training.value(pos, c)));
        }
        Ok(TimeSeries::following(training, n, 1, values)?)
    }
}

/// Extrapolates the line joining the first and last training values.
#[derive(Debug, Clone)]
pub struct NaiveDrift {
    params: ModelParams,
    training: Option<TimeSeries>,
}

impl NaiveDrift {
    pub fn new() -> Self {
        Self {
            params: ModelParams::new(),
            training: None,
        }
    }
}

impl Default for NaiveDrift {
    fn default() -> Self {
        Self::new()
    }
}

impl FromParams for NaiveDrift {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&[])?;
        Ok(Self::new())
    }
}

impl ForecastingModel for NaiveDrift {
    fn name(&self) -> &str {
        "NaiveDrift"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::default()
    }

    fn is_fitted(&self) -> bool {
        self.training.is_some()
    }

    fn fit(&mut self, series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;
        self.training = Some(series.clone());
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        _series: &TimeSeries,
        _covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        let training = fitted_series(self.name(), &self.training)?;
        let last = training.len() - 1;
        let slopes: Vec<f64> = (0..training.width())
            .map(|c| (training.value(last, c) - training.value(0, c)) / last as f64)
            .collect();

        let mut values = Vec::with_capacity(n * training.width());
        for step in 1..=n {
            values.extend(
                slopes
                    .iter()
                    .enumerate()
                    .map(|(c, slope)| training.value(last, c) + slope * step as f64),
            );
        }
        Ok(TimeSeries::following(training, n, 1, values)?)
    }
}
