//! Forecast Backtest CLI
//!
//! # Usage
//!
//! ```bash
//! # Historical forecasts as JSON
//! forecast-backtest historical --config config/default.toml --data data/sales.csv
//!
//! # Backtest error scores
//! forecast-backtest backtest --config config/default.toml --data data/sales.csv
//!
//! # Hyperparameter grid search
//! forecast-backtest gridsearch --config config/default.toml --data data/sales.csv
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use forecast_backtest::models::{
    ExponentialSmoothing, LinearRegressionModel, MovingAverage, NaiveDrift, NaiveMean,
    NaiveSeasonal,
};
use forecast_backtest::search::Evaluation;
use forecast_backtest::{
    AppConfig, Backtester, Covariates, ForecastingModel, FromParams, GridSearch, ModelKind,
    ModelParams, TimeSeries, WalkForwardEngine,
};

#[derive(Parser)]
#[command(name = "forecast-backtest")]
#[command(about = "Walk-forward evaluation of forecasting models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce historical forecasts
    Historical {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to CSV data (overrides [data].path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score historical forecasts with error metrics
    Backtest {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to CSV data (overrides [data].path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search the [search] parameter grid for the best model
    Gridsearch {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to CSV data (overrides [data].path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Target and covariate series read from the configured CSV.
struct Inputs {
    target: TimeSeries,
    covariates: Covariates,
}

fn load_inputs(config: &AppConfig, data: Option<PathBuf>) -> Result<Inputs> {
    let path = data
        .or_else(|| config.data.path.clone())
        .context("No data file: pass --data or set [data].path")?;
    let loader = config.loader()?;
    let df = loader
        .read_csv(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let section = &config.data;
    let value_columns = if section.value_columns.is_empty() {
        let covariate_columns: Vec<String> = section
            .past_covariates
            .iter()
            .chain(&section.future_covariates)
            .cloned()
            .collect();
        loader.remaining_columns(&df, &covariate_columns)
    } else {
        section.value_columns.clone()
    };

    let target = loader.frame_to_series(&df, &value_columns)?;
    let mut covariates = Covariates::none();
    if !section.past_covariates.is_empty() {
        covariates = covariates.with_past(loader.frame_to_series(&df, &section.past_covariates)?);
    }
    if !section.future_covariates.is_empty() {
        covariates = covariates.with_future(loader.frame_to_series(&df, &section.future_covariates)?);
    }

    info!(
        "Loaded {} points of {:?} from {}",
        target.len(),
        target.columns(),
        path.display()
    );
    Ok(Inputs { target, covariates })
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[derive(Serialize)]
struct SearchReport<'a> {
    model: ModelKind,
    params: &'a ModelParams,
    score: f64,
    evaluations: &'a [Evaluation],
}

fn search<M: ForecastingModel + FromParams>(
    config: &AppConfig,
    inputs: &Inputs,
    output: Option<&Path>,
) -> Result<()> {
    let search = GridSearch::new(config.search.parameters.clone(), config.grid_search_config()?);

    let (series, validation) = match config.search.validation_points {
        Some(n) => {
            let len = inputs.target.len();
            if n == 0 || n >= len {
                bail!("validation_points must be below the series length {}", len);
            }
            (inputs.target.head(len - n)?, Some(inputs.target.tail(n)?))
        }
        None => (inputs.target.clone(), None),
    };

    let result = search.run::<M>(&series, &inputs.covariates, validation.as_ref())?;
    info!("Best {} parameters: {}", result.model.name(), result.params.key());

    write_json(
        &SearchReport {
            model: config.model.kind,
            params: &result.params,
            score: result.score,
            evaluations: &result.evaluations,
        },
        output,
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("forecast_backtest=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Historical {
            config,
            data,
            output,
        } => {
            let config = AppConfig::from_file(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let inputs = load_inputs(&config, data)?;
            let mut model = config.model.kind.build(&config.model.params)?;

            let engine = WalkForwardEngine::new(config.walk_forward_config()?);
            let result = engine.run(&mut model, &inputs.target, &inputs.covariates)?;
            write_json(&result, output.as_deref())?;
        }
        Commands::Backtest {
            config,
            data,
            output,
        } => {
            let config = AppConfig::from_file(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let inputs = load_inputs(&config, data)?;
            let mut model = config.model.kind.build(&config.model.params)?;

            let backtester = Backtester::new(config.backtest_config()?);
            let result = backtester.run(&mut model, &inputs.target, &inputs.covariates)?;
            write_json(&result, output.as_deref())?;
        }
        Commands::Gridsearch {
            config,
            data,
            output,
        } => {
            let config = AppConfig::from_file(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let inputs = load_inputs(&config, data)?;
            let output = output.as_deref();

            match config.model.kind {
                ModelKind::NaiveMean => search::<NaiveMean>(&config, &inputs, output)?,
                ModelKind::NaiveSeasonal => search::<NaiveSeasonal>(&config, &inputs, output)?,
                ModelKind::NaiveDrift => search::<NaiveDrift>(&config, &inputs, output)?,
                ModelKind::MovingAverage => search::<MovingAverage>(&config, &inputs, output)?,
                ModelKind::ExponentialSmoothing => {
                    search::<ExponentialSmoothing>(&config, &inputs, output)?
                }
                ModelKind::LinearRegression => {
                    search::<LinearRegressionModel>(&config, &inputs, output)?
                }
            }
        }
    }

    Ok(())
}
