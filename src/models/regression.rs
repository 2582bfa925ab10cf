//! Linear regression on lagged values.
//!
//! Features for the target at time `t`:
//! - intercept
//! - target values at `t-1 ..= t-lags`
//! - every past-covariate component at `t-1 ..= t-lags_past_covariates`
//! - every future-covariate component at `t` (when `use_future_covariates` is set)
//!
//! Coefficients are fit by (optionally ridge-regularised) least squares. Multi-step
//! forecasts are produced recursively from the model's own predictions.

use crate::model::{
    ensure_train_length, CovariateKind, CovariateSupport, Covariates, ForecastingModel, FromParams,
    ModelCapabilities, ModelError, ModelParams,
};
use crate::series::{Frequency, TimeSeries, Timestamp};

/// Diagonal jitter keeping the normal equations solvable.
const MIN_RIDGE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LinearRegressionModel {
    params: ModelParams,
    lags: usize,
    lags_past_covariates: usize,
    use_future_covariates: bool,
    ridge: f64,
    state: Option<FittedState>,
}

#[derive(Debug, Clone)]
struct FittedState {
    coefficients: Vec<f64>,
    past_width: usize,
    future_width: usize,
    fitted_values: TimeSeries,
}

impl LinearRegressionModel {
    pub fn new(
        lags: usize,
        lags_past_covariates: usize,
        use_future_covariates: bool,
        ridge: f64,
    ) -> Result<Self, ModelError> {
        if lags == 0 && lags_past_covariates == 0 && !use_future_covariates {
            return Err(ModelError::InvalidParameter {
                name: "lags".to_string(),
                reason: "at least one of lags, lags_past_covariates or use_future_covariates is required"
                    .to_string(),
            });
        }
        if !(ridge >= 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "ridge".to_string(),
                reason: format!("must be non-negative, got {}", ridge),
            });
        }
        let params = ModelParams::new()
            .with("lags", lags)
            .with("lags_past_covariates", lags_past_covariates)
            .with("use_future_covariates", use_future_covariates)
            .with("ridge", ridge);
        Ok(Self {
            params,
            lags,
            lags_past_covariates,
            use_future_covariates,
            ridge,
            state: None,
        })
    }

    /// Autoregressive model on the target only.
    pub fn autoregressive(lags: usize) -> Result<Self, ModelError> {
        Self::new(lags, 0, false, 0.0)
    }

    /// Fitted coefficients, intercept first.
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.coefficients.as_slice())
    }

    fn max_lag(&self) -> usize {
        self.lags.max(self.lags_past_covariates)
    }

    fn covariate_at(
        &self,
        kind: CovariateKind,
        covariates: &Covariates,
        time: Timestamp,
    ) -> Result<Vec<f64>, ModelError> {
        let missing = || ModelError::CovariateMissing {
            model: self.name().to_string(),
            kind,
            time,
        };
        let series = covariates.get(kind).ok_or_else(missing)?;
        let pos = series.position_of(time).ok_or_else(missing)?;
        Ok((0..series.width()).map(|c| series.value(pos, c)).collect())
    }

    /// Feature row for the target at `time`; `lagged(j)` returns the target at `t-j`.
    fn features(
        &self,
        time: Timestamp,
        freq: Frequency,
        covariates: &Covariates,
        lagged: impl Fn(usize) -> f64,
    ) -> Result<Vec<f64>, ModelError> {
        let mut row = vec![1.0];
        row.extend((1..=self.lags).map(&lagged));

        for j in 1..=self.lags_past_covariates {
            let at = freq
                .advance(time, -(j as i64))
                .ok_or_else(|| ModelError::Numerical(format!("cannot step back from {}", time)))?;
            row.extend(self.covariate_at(CovariateKind::Past, covariates, at)?);
        }
        if self.use_future_covariates {
            row.extend(self.covariate_at(CovariateKind::Future, covariates, time)?);
        }
        Ok(row)
    }

    fn dot(coefficients: &[f64], row: &[f64]) -> f64 {
        coefficients.iter().zip(row).map(|(b, x)| b * x).sum()
    }
}

impl FromParams for LinearRegressionModel {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&["lags", "lags_past_covariates", "use_future_covariates", "ridge"])?;
        Self::new(
            params.usize_or("lags", 1)?,
            params.usize_or("lags_past_covariates", 0)?,
            params.bool_or("use_future_covariates", false)?,
            params.f64_or("ridge", 0.0)?,
        )
    }
}

impl ForecastingModel for LinearRegressionModel {
    fn name(&self) -> &str {
        "LinearRegression"
    }

    fn params(&self) -> &ModelParams {
        &self.params
    }

    fn capabilities(&self) -> ModelCapabilities {
        let support = |needed: bool| {
            if needed {
                CovariateSupport::Required
            } else {
                CovariateSupport::Unsupported
            }
        };
        ModelCapabilities {
            past_covariates: support(self.lags_past_covariates > 0),
            future_covariates: support(self.use_future_covariates),
            retrain_optional: true,
            fitted_values: true,
            probabilistic: false,
        }
    }

    fn min_train_length(&self) -> usize {
        self.max_lag() + 2
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fit(&mut self, series: &TimeSeries, covariates: &Covariates) -> Result<(), ModelError> {
        ensure_train_length(&*self, series)?;
        let target = series
            .univariate_values()
            .map_err(|e| ModelError::Unsupported(format!("{} target: {}", self.name(), e)))?;
        let freq = series.freq();

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for t in self.max_lag()..series.len() {
            let time = series
                .time_at(t)
                .ok_or_else(|| ModelError::Numerical(format!("no timestamp at position {}", t)))?;
            rows.push(self.features(time, freq, covariates, |j| target[t - j])?);
            targets.push(target[t]);
        }

        let coefficients = least_squares(&rows, &targets, self.ridge.max(MIN_RIDGE))?;
        let fitted: Vec<f64> = rows.iter().map(|r| Self::dot(&coefficients, r)).collect();
        let fitted_values = TimeSeries::new(
            series.index().slice(self.max_lag(), series.len()),
            series.columns().to_vec(),
            1,
            fitted,
        )?;

        self.state = Some(FittedState {
            coefficients,
            past_width: covariates.past.as_ref().map_or(0, |s| s.width()),
            future_width: covariates.future.as_ref().map_or(0, |s| s.width()),
            fitted_values,
        });
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        series: &TimeSeries,
        covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        let past_width = covariates.past.as_ref().map_or(0, |s| s.width());
        let future_width = covariates.future.as_ref().map_or(0, |s| s.width());
        if past_width != state.past_width || future_width != state.future_width {
            return Err(ModelError::Unsupported(format!(
                "covariate widths changed since fit (past {} -> {}, future {} -> {})",
                state.past_width, past_width, state.future_width, future_width
            )));
        }
        if series.len() < self.lags {
            return Err(ModelError::TooShort {
                model: self.name().to_string(),
                required: self.lags,
                got: series.len(),
            });
        }

        let mut history = series
            .univariate_values()
            .map_err(|e| ModelError::Unsupported(format!("{} target: {}", self.name(), e)))?;
        let freq = series.freq();
        let end = series.end_time();

        let mut predictions = Vec::with_capacity(n);
        for step in 1..=n {
            let time = freq
                .advance(end, step as i64)
                .ok_or_else(|| ModelError::Numerical(format!("cannot step forward from {}", end)))?;
            let len = history.len();
            let row = self.features(time, freq, covariates, |j| history[len - j])?;
            let value = Self::dot(&state.coefficients, &row);
            history.push(value);
            predictions.push(value);
        }

        Ok(TimeSeries::following(series, n, 1, predictions)?)
    }

    fn fitted_values(&self) -> Option<TimeSeries> {
        self.state.as_ref().map(|s| s.fitted_values.clone())
    }
}

/// Solve `(XᵀX + λI) β = Xᵀy` by Gaussian elimination with partial pivoting.
fn least_squares(rows: &[Vec<f64>], targets: &[f64], ridge: f64) -> Result<Vec<f64>, ModelError> {
    let p = rows.first().map_or(0, |r| r.len());
    if p == 0 {
        return Err(ModelError::Numerical("no training rows".to_string()));
    }

    // augmented normal-equation matrix [XᵀX + λI | Xᵀy]
    let mut a = vec![vec![0.0; p + 1]; p];
    for (row, y) in rows.iter().zip(targets) {
        for i in 0..p {
            for j in 0..p {
                a[i][j] += row[i] * row[j];
            }
            a[i][p] += row[i] * y;
        }
    }
    for (i, r) in a.iter_mut().enumerate() {
        r[i] += ridge;
    }

    for col in 0..p {
        let pivot = (col..p)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-14 {
            return Err(ModelError::Numerical("singular design matrix".to_string()));
        }
        a.swap(col, pivot);
        for r in (col + 1)..p {
            let factor = a[r][col] / a[col][col];
            for c in col..=p {
                a[r][c] -= factor * a[col][c];
            }
        }
    }

    let mut beta = vec![0.0; p];
    for i in (0..p).rev() {
        let tail: f64 = ((i + 1)..p).map(|j| a[i][j] * beta[j]).sum();
        beta[i] = (a[i][p] - tail) / a[i][i];
    }
    Ok(beta)
}
