//! Simple exponential smoothing.

use crate::model::{
    ensure_train_length, Covariates, ForecastingModel, FromParams, ModelCapabilities, ModelError,
    ModelParams,
};
use crate::series::TimeSeries;

/// Level-only exponential smoothing with a fixed smoothing factor.
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    params: ModelParams,
    alpha: f64,
    levels: Vec<f64>,
    fitted: Option<TimeSeries>,
    training: Option<TimeSeries>,
}

impl ExponentialSmoothing {
    pub fn new(alpha: f64) -> Result<Self, ModelError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "alpha".to_string(),
                reason: format!("must be in (0, 1], got {}", alpha),
            });
        }
        Ok(Self {
            params: ModelParams::new().with("alpha", alpha),
            alpha,
            levels: Vec::new(),
            fitted: None,
            training: None,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl FromParams for ExponentialSmoothing {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&["alpha"])?;
        Self::new(params.f64_or("alpha", 0.5)?)
    }
}

impl ForecastingModel for ExponentialSmoothing {
    fn name(&self) -> &str {
        "ExponentialSmoothing"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            fitted_values: true,
            ..ModelCapabilities::default()
        }
    }

    fn is_fitted(&self) -> bool {
        self.training.is_some()
    }

    fn fit(&mut self, series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;

        let width = series.width();
        let mut levels: Vec<f64> = (0..width).map(|c| series.value(0, c)).collect();
        let mut fitted = Vec::with_capacity(series.len() * width);
        for t in 0..series.len() {
            for (c, level) in levels.iter_mut().enumerate() {
                // one-step-ahead fitted value is the level before observing t
                fitted.push(*level);
                *level = self.alpha * series.value(t, c) + (1.0 - self.alpha) * *level;
            }
        }

        self.fitted = Some(TimeSeries::new(
            series.index().clone(),
            series.columns().to_vec(),
            1,
            fitted,
        )?);
        self.levels = levels;
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
        let training = self
            .training
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        let values = (0..n).flat_map(|_| self.levels.iter().copied()).collect();
        Ok(TimeSeries::following(training, n, 1, values)?)
    }

    fn fitted_values(&self) -> Option<TimeSeries> {
        self.fitted.clone()
    }
}
