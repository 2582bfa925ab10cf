//! Time series container.
//!
//! - `TimeIndex`: integer or calendar index with a fixed frequency
//! - `TimeSeries`: immutable values over an index, with optional samples and metadata

pub mod index;
pub mod timeseries;

pub use index::{Frequency, TimeIndex, Timestamp};
pub use timeseries::{SeriesError, SeriesResult, TimeSeries};
