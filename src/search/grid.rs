//! Hyperparameter grids and random down-sampling.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::model::{ModelParams, ParamValue};

/// Candidate values per parameter, in insertion order.
///
/// Combinations are enumerated with the last parameter varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<ParamValue>>", into = "BTreeMap<String, Vec<ParamValue>>")]
pub struct ParameterGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidates of one parameter.
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = values,
            None => self.params.push((name.to_string(), values)),
        }
        self
    }

    /// Parameter names in enumeration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Calculate total number of parameter combinations.
    pub fn total_combinations(&self) -> usize {
        self.params.iter().map(|(_, values)| values.len()).product()
    }

    /// Generate all parameter combinations.
    pub fn combinations(&self) -> Vec<ModelParams> {
        let mut combos = vec![ModelParams::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|base| {
                    values.iter().map(move |v| {
                        let mut params = base.clone();
                        params.insert(name, v.clone());
                        params
                    })
                })
                .collect();
        }
        combos
    }
}

impl From<BTreeMap<String, Vec<ParamValue>>> for ParameterGrid {
    fn from(map: BTreeMap<String, Vec<ParamValue>>) -> Self {
        Self {
            params: map.into_iter().collect(),
        }
    }
}

impl From<ParameterGrid> for BTreeMap<String, Vec<ParamValue>> {
    fn from(grid: ParameterGrid) -> Self {
        grid.params.into_iter().collect()
    }
}

/// How many combinations to evaluate when sampling the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleSize {
    /// Absolute number of combinations.
    Count(usize),
    /// Fraction of all combinations in `(0, 1]`.
    Fraction(f64),
}

impl SampleSize {
    /// Number of combinations to draw out of `total`.
    pub fn resolve(&self, total: usize) -> Result<usize> {
        match *self {
            Self::Count(n) => {
                if n == 0 || n > total {
                    return Err(ForecastError::InvalidSampleSize(format!(
                        "{} is not between 1 and the {} available combinations",
                        n, total
                    )));
                }
                Ok(n)
            }
            Self::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(ForecastError::InvalidSampleSize(format!(
                        "fraction {} is outside (0, 1]",
                        f
                    )));
                }
                let n = (f * total as f64).round() as usize;
                if n == 0 {
                    return Err(ForecastError::InvalidSampleSize(format!(
                        "fraction {} of {} combinations selects none",
                        f, total
                    )));
                }
                Ok(n)
            }
        }
    }
}

/// `n` distinct indices of `0..total`, uniformly drawn, in increasing order.
pub fn sample_indices(total: usize, n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut indices = rand::seq::index::sample(&mut rng, total, n.min(total)).into_vec();
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_grid_combinations() {
        let grid = ParameterGrid::new()
            .with("window", [2usize, 3])
            .with("alpha", [0.1, 0.2, 0.3]);
        assert_eq!(grid.total_combinations(), 6);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);
        // last parameter varies fastest
        assert_eq!(combos[0].key(), "alpha=0.1_window=2");
        assert_eq!(combos[1].key(), "alpha=0.2_window=2");
        assert_eq!(combos[3].key(), "alpha=0.1_window=3");
    }

    #[test]
    fn test_empty_candidate_list() {
        let grid = ParameterGrid::new().with("window", Vec::<usize>::new());
        assert_eq!(grid.total_combinations(), 0);
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn test_grid_from_toml() {
        let grid: ParameterGrid = toml::from_str("window = [2, 4]\nalpha = [0.5]").unwrap();
        assert_eq!(grid.total_combinations(), 2);
        assert_eq!(grid.names().collect::<Vec<_>>(), vec!["alpha", "window"]);
    }

    #[test]
    fn test_sample_size_resolution() {
        assert_eq!(SampleSize::Count(2).resolve(6).unwrap(), 2);
        assert_eq!(SampleSize::Fraction(0.5).resolve(6).unwrap(), 3);
        assert!(SampleSize::Count(0).resolve(6).is_err());
        assert!(SampleSize::Count(7).resolve(6).is_err());
        assert!(SampleSize::Fraction(0.0).resolve(6).is_err());
        assert!(SampleSize::Fraction(1.5).resolve(6).is_err());
        assert!(SampleSize::Fraction(0.01).resolve(6).is_err());
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let a = sample_indices(100, 10, Some(7));
        let b = sample_indices(100, 10, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }
}
