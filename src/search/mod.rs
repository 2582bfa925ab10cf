//! Hyperparameter search.

pub mod grid;
pub mod gridsearch;

pub use grid::{sample_indices, ParameterGrid, SampleSize};
pub use gridsearch::{
    Evaluation, GridSearch, GridSearchConfig, GridSearchResult, Parallelism, SearchMode,
};
