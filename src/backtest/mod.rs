//! Backtesting of forecasting models.
//!
//! - Error scores of historical forecasts, reduced over iterations or kept per iteration
//! - Residuals of one-step (or k-step) historical forecasts

pub mod backtester;
pub mod residuals;

pub use backtester::{BacktestConfig, BacktestResult, BacktestScore, Backtester};
pub use residuals::residuals;
