//! Reductions of per-iteration metric values to one score.

use std::fmt;
use std::str::FromStr;

use statrs::statistics::{Data, Median};

use super::error_metrics::MetricError;

/// How per-iteration scores are collapsed.
#[derive(Clone, Copy)]
pub enum Reduction {
    Mean,
    Median,
    Max,
    Min,
    Custom(&'static str, fn(&[f64]) -> f64),
}

impl Default for Reduction {
    fn default() -> Self {
        Self::Mean
    }
}

impl Reduction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Max => "max",
            Self::Min => "min",
            Self::Custom(name, _) => name,
        }
    }

    /// Reduce `values` to a single number. An empty slice reduces to NaN.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Median => Data::new(values.to_vec()).median(),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Custom(_, f) => f(values),
        }
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reduction({})", self.name())
    }
}

impl PartialEq for Reduction {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl FromStr for Reduction {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(MetricError::Unknown(format!("reduction {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_reductions() {
        let values = [3.0, 1.0, 2.0, 10.0];
        assert_relative_eq!(Reduction::Mean.apply(&values), 4.0);
        assert_relative_eq!(Reduction::Median.apply(&values), 2.5);
        assert_relative_eq!(Reduction::Max.apply(&values), 10.0);
        assert_relative_eq!(Reduction::Min.apply(&values), 1.0);
    }

    #[test]
    fn test_custom_reduction() {
        fn last(values: &[f64]) -> f64 {
            values[values.len() - 1]
        }
        let reduction = Reduction::Custom("last", last);
        assert_relative_eq!(reduction.apply(&[1.0, 7.0]), 7.0);
        assert_eq!(reduction.name(), "last");
    }

    #[test]
    fn test_parse_and_empty() {
        assert_eq!("Median".parse::<Reduction>().unwrap(), Reduction::Median);
        assert!("sum".parse::<Reduction>().is_err());
        assert!(Reduction::Mean.apply(&[]).is_nan());
    }
}
