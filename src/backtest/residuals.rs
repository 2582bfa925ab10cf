//! In-sample residuals from historical forecasts.

use crate::error::Result;
use crate::metrics::deterministic;
use crate::model::{Covariates, ForecastingModel};
use crate::series::{SeriesError, TimeSeries};
use crate::walkforward::{RetrainPolicy, Start, WalkForwardConfig, WalkForwardEngine};

/// Residuals `actual − forecast` of the last points of `forecast_horizon`-step forecasts.
///
/// Forecasts start at the first position the model can train on and advance one step
/// at a time. Stochastic forecasts are reduced to their median. Univariate series only.
pub fn residuals<M: ForecastingModel + ?Sized>(
    model: &mut M,
    series: &TimeSeries,
    covariates: &Covariates,
    forecast_horizon: usize,
    retrain: RetrainPolicy,
) -> Result<TimeSeries> {
    if series.width() != 1 {
        return Err(SeriesError::NotUnivariate(series.width()).into());
    }

    let config = WalkForwardConfig::default()
        .with_start(Start::Position(model.min_train_length().max(1)))
        .with_forecast_horizon(forecast_horizon)
        .with_stride(1)
        .with_retrain(retrain)
        .with_last_points_only(true);
    let output = WalkForwardEngine::new(config).run(model, series, covariates)?;

    let forecasts = output.forecasts.last_points().ok_or_else(|| {
        SeriesError::InvalidIndex("expected last-point forecasts".to_string())
    })?;
    let forecasts = deterministic(forecasts, "forecast");

    let mut values = Vec::with_capacity(forecasts.len());
    for (i, ts) in forecasts.index().iter().enumerate() {
        let pos = series
            .position_of(ts)
            .ok_or_else(|| SeriesError::OutOfRange(format!("{} is not in the series", ts)))?;
        values.push(series.value(pos, 0) - forecasts.value(i, 0));
    }

    Ok(TimeSeries::univariate(forecasts.index().clone(), values)?
        .with_columns(series.columns().to_vec())?
        .with_metadata_of(series))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NaiveMean, NaiveSeasonal};
    use crate::series::Timestamp;

    #[test]
    fn test_naive_residuals_are_differences() {
        let series = TimeSeries::from_values(vec![1.0, 3.0, 6.0, 10.0, 15.0]).unwrap();
        let mut model = NaiveSeasonal::new(1).unwrap();
        let res = residuals(&mut model, &series, &Covariates::none(), 1, RetrainPolicy::Always).unwrap();
        assert_eq!(res.start_time(), Timestamp::Index(1));
        assert_eq!(res.component_values(0), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_constant_series_has_zero_residuals() {
        let series = TimeSeries::from_values(vec![4.0; 12]).unwrap();
        let mut model = NaiveMean::default();
        let res = residuals(&mut model, &series, &Covariates::none(), 2, RetrainPolicy::Always).unwrap();
        assert_eq!(res.len(), 10);
        assert!(res.component_values(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_multivariate_rejected() {
        let index = crate::series::TimeIndex::range(0, 1, 4).unwrap();
        let series = TimeSeries::from_rows(
            index,
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0]; 4],
        )
        .unwrap();
        let mut model = NaiveMean::default();
        assert!(residuals(&mut model, &series, &Covariates::none(), 1, RetrainPolicy::Always).is_err());
    }
}
