//! Walk-forward evaluation.
//!
//! Produces historical forecasts without look-ahead:
//! - Schedule: prediction points from a start, horizon and stride
//! - Windows: expanding or sliding training windows plus causal covariate windows
//! - Retrain: always / never / every k / predicate
//! - Engine: the sequential fit-and-forecast loop
//! - Assembler: last points as one series, or every forecast in full

pub mod assembler;
pub mod engine;
pub mod retrain;
pub mod schedule;
pub mod windows;

pub use assembler::{ForecastAssembler, HistoricalForecasts};
pub use engine::{WalkForwardConfig, WalkForwardEngine, WalkForwardOutput};
pub use retrain::{RetrainContext, RetrainPolicy, RetrainPredicate, RetrainSetting};
pub use schedule::{prediction_points, PredictionPoint, Start};
pub use windows::{check_covariate_support, TrainingWindows, WindowBuilder};
