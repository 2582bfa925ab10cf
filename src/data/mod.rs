//! Data loading.

pub mod loader;

pub use loader::{parse_frequency, LoaderError, SeriesLoader};
