use approx::assert_relative_eq;

use forecast_backtest::models::{ExponentialSmoothing, MovingAverage, NaiveSeasonal};
use forecast_backtest::{
    residuals, BacktestConfig, BacktestScore, Backtester, Covariates, ForecastError,
    ForecastingModel, FromParams, GridSearch, GridSearchConfig, Metric, ModelCapabilities,
    ModelError, ModelParams, Parallelism, ParameterGrid, Reduction, RetrainPolicy, SampleSize,
    Start, TimeSeries, WalkForwardConfig,
};

/// Forecasts `level + bias` at every step.
#[derive(Debug)]
struct ConstantModel {
    params: ModelParams,
    value: f64,
    fitted: bool,
}

impl FromParams for ConstantModel {
    fn from_params(params: &ModelParams) -> Result<Self, ModelError> {
        params.ensure_known(&["level", "bias"])?;
        let value = params.f64_or("level", 0.0)? + params.f64_or("bias", 0.0)?;
        Ok(Self {
            params: params.clone(),
            value,
            fitted: false,
        })
    }
}

impl ForecastingModel for ConstantModel {
    fn name(&self) -> &str {
        "ConstantModel"
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
        self.fitted
    }

    fn fit(&mut self, _series: &TimeSeries, _covariates: &Covariates) -> Result<(), ModelError> {
        self.fitted = true;
        Ok(())
    }

    fn predict(
        &self,
        n: usize,
        series: &TimeSeries,
        _covariates: &Covariates,
        _num_samples: usize,
    ) -> Result<TimeSeries, ModelError> {
        Ok(TimeSeries::following(series, n, 1, vec![self.value; n])?)
    }
}

fn flat(n: usize, level: f64) -> TimeSeries {
    TimeSeries::from_values(vec![level; n]).unwrap()
}

fn ramp(n: usize) -> TimeSeries {
    TimeSeries::from_values((1..=n).map(|i| i as f64).collect()).unwrap()
}

fn grid() -> ParameterGrid {
    ParameterGrid::new()
        .with("level", [9.0, 10.0])
        .with("bias", [-1.0, 0.0, 1.0])
}

fn expanding(horizon: usize) -> GridSearchConfig {
    GridSearchConfig::default()
        .with_forecast_horizon(horizon)
        .with_start(Start::Position(10))
        .with_metric(Metric::MAE)
}

#[test]
fn test_first_best_wins_ties() {
    let series = flat(20, 10.0);
    let search = GridSearch::new(grid(), expanding(1));
    let result = search
        .run::<ConstantModel>(&series, &Covariates::none(), None)
        .unwrap();

    assert_eq!(result.evaluations.len(), 6);
    // level=9, bias=1 is enumerated before level=10, bias=0
    assert_eq!(
        result.params,
        ModelParams::new().with("level", 9.0).with("bias", 1.0)
    );
    assert_relative_eq!(result.score, 0.0);
    assert_eq!(result.model.params(), &result.params);
    assert!(!result.model.is_fitted());
}

#[test]
fn test_random_subset_is_reproducible() {
    let series = flat(20, 10.0);
    let config = expanding(1).with_random_samples(SampleSize::Count(2), Some(7));
    let search = GridSearch::new(grid(), config);

    let first = search
        .run::<ConstantModel>(&series, &Covariates::none(), None)
        .unwrap();
    let second = search
        .run::<ConstantModel>(&series, &Covariates::none(), None)
        .unwrap();

    assert_eq!(first.evaluations.len(), 2);
    assert_ne!(first.evaluations[0].params, first.evaluations[1].params);
    assert_eq!(first.evaluations, second.evaluations);

    let all = grid().combinations();
    assert!(first.evaluations.iter().all(|e| all.contains(&e.params)));
}

#[test]
fn test_parallel_matches_sequential() {
    let series = ramp(30);
    let grid = ParameterGrid::new().with("window", [1usize, 2, 3, 5]);

    let sequential = GridSearch::new(grid.clone(), expanding(2))
        .run::<MovingAverage>(&series, &Covariates::none(), None)
        .unwrap();
    let parallel = GridSearch::new(
        grid,
        expanding(2).with_parallelism(Parallelism::Threads(2)),
    )
    .run::<MovingAverage>(&series, &Covariates::none(), None)
    .unwrap();

    assert_eq!(sequential.evaluations, parallel.evaluations);
    assert_eq!(sequential.params, parallel.params);
    // on a rising series the shortest window lags least
    assert_eq!(sequential.params, ModelParams::new().with("window", 1usize));
}

#[test]
fn test_exactly_one_mode_required() {
    let series = flat(20, 10.0);
    let validation = flat(5, 10.0);

    let both = GridSearch::new(grid(), expanding(1));
    let err = both
        .run::<ConstantModel>(&series, &Covariates::none(), Some(&validation))
        .unwrap_err();
    assert!(matches!(err, ForecastError::SearchModeConflict(2)));

    let none = GridSearch::new(grid(), GridSearchConfig::default());
    let err = none
        .run::<ConstantModel>(&series, &Covariates::none(), None)
        .unwrap_err();
    assert!(matches!(err, ForecastError::SearchModeConflict(0)));
}

#[test]
fn test_split_mode_scores_validation() {
    let full = flat(20, 10.0);
    let train = full.head(15).unwrap();
    let validation = full.tail(5).unwrap();

    let search = GridSearch::new(grid(), GridSearchConfig::default().with_metric(Metric::MAE));
    let result = search
        .run::<ConstantModel>(&train, &Covariates::none(), Some(&validation))
        .unwrap();

    let scores: Vec<f64> = result.evaluations.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![2.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn test_fitted_values_mode() {
    let series = ramp(30);
    let grid = ParameterGrid::new().with("alpha", [0.1, 0.5, 0.9]);
    let config = GridSearchConfig::default()
        .with_fitted_values(true)
        .with_metric(Metric::MAE);

    let result = GridSearch::new(grid.clone(), config.clone())
        .run::<ExponentialSmoothing>(&series, &Covariates::none(), None)
        .unwrap();
    assert_eq!(result.evaluations.len(), 3);
    // the heaviest weight on recent values tracks a trend best
    assert_eq!(result.params, ModelParams::new().with("alpha", 0.9));

    let err = GridSearch::new(ParameterGrid::new().with("window", [2usize]), config)
        .run::<MovingAverage>(&series, &Covariates::none(), None)
        .unwrap_err();
    assert!(matches!(err, ForecastError::FittedValuesUnavailable(_)));
}

#[test]
fn test_backtest_mean_reduction_matches_matrix() {
    let series = ramp(20);
    let walk_forward = WalkForwardConfig::default()
        .with_start(Start::Position(10))
        .with_forecast_horizon(2)
        .with_last_points_only(false);
    let metrics = vec![Metric::MAE, Metric::RMSE];

    let mut model = NaiveSeasonal::new(1).unwrap();
    let raw = Backtester::new(
        BacktestConfig::default()
            .with_walk_forward(walk_forward.clone())
            .with_metrics(metrics.clone())
            .with_reduction(None),
    )
    .run(&mut model, &series, &Covariates::none())
    .unwrap();

    let BacktestScore::PerIteration(matrix) = raw.score else {
        panic!("expected one row per forecast");
    };
    assert_eq!(matrix.len(), 9);
    assert!(matrix.iter().all(|row| row.len() == 2));

    let mut model = NaiveSeasonal::new(1).unwrap();
    let reduced = Backtester::new(
        BacktestConfig::default()
            .with_walk_forward(walk_forward)
            .with_metrics(metrics)
            .with_reduction(Some(Reduction::Mean)),
    )
    .run(&mut model, &series, &Covariates::none())
    .unwrap();

    let BacktestScore::PerMetric(means) = reduced.score else {
        panic!("expected one score per metric");
    };
    for (j, mean) in means.iter().enumerate() {
        let expected = matrix.iter().map(|row| row[j]).sum::<f64>() / matrix.len() as f64;
        assert_relative_eq!(*mean, expected, epsilon = 1e-12);
    }
    // last-value forecasts of a unit ramp miss by 1 then 2
    assert_relative_eq!(means[0], 1.5, epsilon = 1e-12);
}

#[test]
fn test_residuals_of_last_value_model() {
    let series = ramp(12);
    let mut model = NaiveSeasonal::new(1).unwrap();
    let res = residuals(
        &mut model,
        &series,
        &Covariates::none(),
        1,
        RetrainPolicy::Always,
    )
    .unwrap();

    assert_eq!(res.len(), 11);
    assert!(res.component_values(0).iter().all(|r| (*r - 1.0).abs() < 1e-12));
}
