//! TOML configuration for the CLI.
//!
//! ```toml
//! [data]
//! time_column = "date"
//! value_columns = ["sales"]
//! future_covariates = ["promo"]
//!
//! [model]
//! kind = "moving_average"
//! params = { window = 4 }
//!
//! [walk_forward]
//! start = 0.8
//! forecast_horizon = 3
//! retrain = 5
//!
//! [backtest]
//! metrics = ["mape", "rmse"]
//!
//! [search]
//! forecast_horizon = 3
//! n_jobs = -1
//! parameters = { window = [2, 4, 8] }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::data::{parse_frequency, SeriesLoader};
use crate::metrics::{Metric, Reduction};
use crate::model::ModelParams;
use crate::models::ModelKind;
use crate::search::{GridSearchConfig, Parallelism, ParameterGrid, SampleSize};
use crate::series::Timestamp;
use crate::walkforward::{RetrainSetting, Start, WalkForwardConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Start as written in a config file: position, fraction or timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartSetting {
    Position(usize),
    Fraction(f64),
    Time(String),
}

impl Default for StartSetting {
    fn default() -> Self {
        Self::Fraction(0.5)
    }
}

impl StartSetting {
    pub fn to_start(&self) -> Result<Start, ConfigError> {
        match self {
            Self::Position(i) => Ok(Start::Position(*i)),
            Self::Fraction(f) => Ok(Start::Fraction(*f)),
            Self::Time(text) => parse_timestamp(text).map(Start::Time),
        }
    }
}

fn parse_timestamp(text: &str) -> Result<Timestamp, ConfigError> {
    if let Ok(i) = text.trim().parse::<i64>() {
        return Ok(Timestamp::Index(i));
    }
    let text = text.trim();
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(Timestamp::DateTime)
        .ok_or_else(|| ConfigError::Invalid {
            key: "walk_forward.start",
            reason: format!("cannot parse `{}` as a timestamp", text),
        })
}

/// Input data settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file; the `--data` flag takes precedence.
    pub path: Option<PathBuf>,
    pub time_column: Option<String>,
    /// Target columns (all columns not used elsewhere when empty).
    pub value_columns: Vec<String>,
    pub past_covariates: Vec<String>,
    pub future_covariates: Vec<String>,
    /// Explicit frequency such as `D`, `h`, `M` or an integer step.
    pub frequency: Option<String>,
}

/// Model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    #[serde(default)]
    pub params: ModelParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::NaiveSeasonal,
            params: ModelParams::default(),
        }
    }
}

/// Walk-forward settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardSection {
    pub start: StartSetting,
    pub forecast_horizon: usize,
    pub stride: usize,
    /// `true`, `false` or a refit interval (`0` = never).
    pub retrain: RetrainSetting,
    pub overlap_end: bool,
    pub last_points_only: bool,
    pub train_length: Option<usize>,
    pub num_samples: usize,
    pub verbose: bool,
}

impl Default for WalkForwardSection {
    fn default() -> Self {
        Self {
            start: StartSetting::default(),
            forecast_horizon: 1,
            stride: 1,
            retrain: RetrainSetting::default(),
            overlap_end: false,
            last_points_only: true,
            train_length: None,
            num_samples: 1,
            verbose: false,
        }
    }
}

/// Backtest scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub metrics: Vec<String>,
    /// `mean`, `median`, `max`, `min` or `none` for the per-iteration matrix.
    pub reduction: String,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            metrics: vec!["mape".to_string()],
            reduction: "mean".to_string(),
        }
    }
}

/// Hyperparameter search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub parameters: ParameterGrid,
    pub forecast_horizon: Option<usize>,
    pub use_fitted_values: bool,
    /// Hold out the last `n` points as a validation series.
    pub validation_points: Option<usize>,
    /// Ranking metric; defaults to the first backtest metric.
    pub metric: Option<String>,
    /// Worker count, `-1` for all cores.
    pub n_jobs: i64,
    /// Number (integer) or fraction (float) of combinations to sample.
    pub n_random_samples: Option<SampleSize>,
    pub seed: Option<u64>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            parameters: ParameterGrid::default(),
            forecast_horizon: None,
            use_fitted_values: false,
            validation_points: None,
            metric: None,
            n_jobs: 1,
            n_random_samples: None,
            seed: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub walk_forward: WalkForwardSection,
    pub backtest: BacktestSection,
    pub search: SearchSection,
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// CSV loader for the `[data]` section.
    pub fn loader(&self) -> Result<SeriesLoader, ConfigError> {
        let mut loader = SeriesLoader::new();
        if let Some(column) = &self.data.time_column {
            loader = loader.with_time_column(column.clone());
        }
        if let Some(freq) = &self.data.frequency {
            let freq = parse_frequency(freq).map_err(|e| ConfigError::Invalid {
                key: "data.frequency",
                reason: e.to_string(),
            })?;
            loader = loader.with_frequency(freq);
        }
        Ok(loader)
    }

    pub fn walk_forward_config(&self) -> Result<WalkForwardConfig, ConfigError> {
        let section = &self.walk_forward;
        Ok(WalkForwardConfig::default()
            .with_start(section.start.to_start()?)
            .with_forecast_horizon(section.forecast_horizon)
            .with_stride(section.stride)
            .with_retrain(section.retrain)
            .with_overlap_end(section.overlap_end)
            .with_last_points_only(section.last_points_only)
            .with_train_length(section.train_length)
            .with_num_samples(section.num_samples)
            .with_verbose(section.verbose))
    }

    pub fn metrics(&self) -> Result<Vec<Metric>, ConfigError> {
        self.backtest
            .metrics
            .iter()
            .map(|name| {
                name.parse::<Metric>().map_err(|e| ConfigError::Invalid {
                    key: "backtest.metrics",
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// `None` when the reduction is `none`.
    pub fn reduction(&self) -> Result<Option<Reduction>, ConfigError> {
        if self.backtest.reduction.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        self.backtest
            .reduction
            .parse::<Reduction>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: "backtest.reduction",
                reason: e.to_string(),
            })
    }

    pub fn backtest_config(&self) -> Result<BacktestConfig, ConfigError> {
        Ok(BacktestConfig::default()
            .with_walk_forward(self.walk_forward_config()?)
            .with_metrics(self.metrics()?)
            .with_reduction(self.reduction()?))
    }

    /// Grid search settings. Start, stride, train length and last-points mode come from
    /// `[walk_forward]`.
    pub fn grid_search_config(&self) -> Result<GridSearchConfig, ConfigError> {
        let search = &self.search;
        let metric = match &search.metric {
            Some(name) => name.parse::<Metric>().map_err(|e| ConfigError::Invalid {
                key: "search.metric",
                reason: e.to_string(),
            })?,
            None => self.metrics()?.first().copied().unwrap_or(Metric::MAPE),
        };

        let mut config = GridSearchConfig::default()
            .with_fitted_values(search.use_fitted_values)
            .with_start(self.walk_forward.start.to_start()?)
            .with_stride(self.walk_forward.stride)
            .with_last_points_only(self.walk_forward.last_points_only)
            .with_train_length(self.walk_forward.train_length)
            .with_metric(metric)
            .with_reduction(self.reduction()?.unwrap_or_default())
            .with_parallelism(Parallelism::from_jobs(search.n_jobs))
            .with_verbose(self.walk_forward.verbose);
        if let Some(horizon) = search.forecast_horizon {
            config = config.with_forecast_horizon(horizon);
        }
        if let Some(samples) = search.n_random_samples {
            config = config.with_random_samples(samples, search.seed);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamValue;
    use crate::walkforward::RetrainPolicy;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.model.kind, ModelKind::NaiveSeasonal);
        let wf = config.walk_forward_config().unwrap();
        assert_eq!(wf.start, Start::Fraction(0.5));
        assert!(matches!(wf.retrain, RetrainPolicy::Always));
        assert_eq!(config.backtest_config().unwrap().metrics, vec![Metric::MAPE]);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            [data]
            time_column = "date"
            value_columns = ["y"]
            frequency = "D"

            [model]
            kind = "moving_average"
            params = { window = 4 }

            [walk_forward]
            start = "2024-03-01"
            forecast_horizon = 3
            retrain = 0
            train_length = 20

            [backtest]
            metrics = ["mae", "rmse"]
            reduction = "none"

            [search]
            forecast_horizon = 2
            n_jobs = -1
            n_random_samples = 0.5
            seed = 7
            parameters = { window = [2, 4, 8] }
        "#;
        let config: AppConfig = text.parse().unwrap();
        assert_eq!(config.model.kind, ModelKind::MovingAverage);
        assert_eq!(config.model.params.get("window"), Some(&ParamValue::Int(4)));

        let wf = config.walk_forward_config().unwrap();
        assert_eq!(wf.start, Start::Time(Timestamp::date(2024, 3, 1).unwrap()));
        assert!(matches!(wf.retrain, RetrainPolicy::Never));
        assert_eq!(wf.train_length, Some(20));

        let backtest = config.backtest_config().unwrap();
        assert_eq!(backtest.metrics, vec![Metric::MAE, Metric::RMSE]);
        assert_eq!(backtest.reduction, None);

        let search = config.grid_search_config().unwrap();
        assert_eq!(search.forecast_horizon, Some(2));
        assert_eq!(search.parallelism, Parallelism::All);
        assert_eq!(search.n_random_samples, Some(SampleSize::Fraction(0.5)));
        assert_eq!(search.metric, Metric::MAE);
        assert_eq!(config.search.parameters.total_combinations(), 3);
    }

    #[test]
    fn test_start_variants() {
        assert_eq!(StartSetting::Position(10).to_start().unwrap(), Start::Position(10));
        assert_eq!(
            StartSetting::Time("42".into()).to_start().unwrap(),
            Start::Time(Timestamp::Index(42))
        );
        assert!(StartSetting::Time("soon".into()).to_start().is_err());
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let config: AppConfig = "[backtest]\nmetrics = [\"r2\"]".parse().unwrap();
        assert!(config.backtest_config().is_err());
    }
}
