//! Immutable multivariate, optionally stochastic, time series.
//!
//! Values are stored row-major as `[time][component][sample]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use thiserror::Error;

use super::index::{Frequency, TimeIndex, Timestamp};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Series must contain at least one point")]
    Empty,

    #[error("Series must contain at least one component")]
    NoComponents,

    #[error("Shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Invalid time index: {0}")]
    InvalidIndex(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Series is not univariate ({0} components)")]
    NotUnivariate(usize),
}

pub type SeriesResult<T> = Result<T, SeriesError>;

/// Regularly sampled time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRecord")]
pub struct TimeSeries {
    index: TimeIndex,
    columns: Vec<String>,
    n_samples: usize,
    values: Vec<f64>,
    #[serde(default)]
    static_covariates: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    hierarchy: Option<BTreeMap<String, Vec<String>>>,
}

/// Serialized form, checked through `TimeSeries::new` on the way in.
#[derive(Deserialize)]
struct SeriesRecord {
    index: TimeIndex,
    columns: Vec<String>,
    n_samples: usize,
    values: Vec<f64>,
    #[serde(default)]
    static_covariates: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    hierarchy: Option<BTreeMap<String, Vec<String>>>,
}

impl TryFrom<SeriesRecord> for TimeSeries {
    type Error = SeriesError;

    fn try_from(record: SeriesRecord) -> SeriesResult<Self> {
        if !record.index.is_well_formed() {
            return Err(SeriesError::InvalidIndex(format!("{:?}", record.index)));
        }
        let mut series = Self::new(record.index, record.columns, record.n_samples, record.values)?;
        series.static_covariates = record.static_covariates;
        series.hierarchy = record.hierarchy;
        Ok(series)
    }
}

impl TimeSeries {
    /// Create a series from an index, column names and row-major values.
    pub fn new(
        index: TimeIndex,
        columns: Vec<String>,
        n_samples: usize,
        values: Vec<f64>,
    ) -> SeriesResult<Self> {
        if index.is_empty() {
            return Err(SeriesError::Empty);
        }
        if columns.is_empty() {
            return Err(SeriesError::NoComponents);
        }
        if n_samples == 0 {
            return Err(SeriesError::ShapeMismatch {
                expected: index.len() * columns.len(),
                got: 0,
            });
        }
        let expected = index.len() * columns.len() * n_samples;
        if values.len() != expected {
            return Err(SeriesError::ShapeMismatch {
                expected,
                got: values.len(),
            });
        }
        Ok(Self {
            index,
            columns,
            n_samples,
            values,
            static_covariates: None,
            hierarchy: None,
        })
    }

    /// Univariate deterministic series on the given index.
    pub fn univariate(index: TimeIndex, values: Vec<f64>) -> SeriesResult<Self> {
        Self::new(index, vec!["0".to_string()], 1, values)
    }

    /// Univariate series indexed `0, 1, 2, ...`.
    pub fn from_values(values: Vec<f64>) -> SeriesResult<Self> {
        let index = TimeIndex::range(0, 1, values.len())
            .ok_or_else(|| SeriesError::InvalidIndex("range index".to_string()))?;
        Self::univariate(index, values)
    }

    /// Deterministic multivariate series from one row per timestamp.
    pub fn from_rows(index: TimeIndex, columns: Vec<String>, rows: Vec<Vec<f64>>) -> SeriesResult<Self> {
        let width = columns.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(SeriesError::ShapeMismatch {
                expected: width,
                got: bad.len(),
            });
        }
        if rows.len() != index.len() {
            return Err(SeriesError::ShapeMismatch {
                expected: index.len(),
                got: rows.len(),
            });
        }
        Self::new(index, columns, 1, rows.into_iter().flatten().collect())
    }

    /// Attach static covariates.
    pub fn with_static_covariates(mut self, covariates: BTreeMap<String, f64>) -> Self {
        self.static_covariates = Some(covariates);
        self
    }

    /// Attach a component hierarchy.
    pub fn with_hierarchy(mut self, hierarchy: BTreeMap<String, Vec<String>>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Copy static covariates and hierarchy from another series.
    pub fn with_metadata_of(mut self, other: &TimeSeries) -> Self {
        self.static_covariates = other.static_covariates.clone();
        self.hierarchy = other.hierarchy.clone();
        self
    }

    /// Replace column names.
    pub fn with_columns(mut self, columns: Vec<String>) -> SeriesResult<Self> {
        if columns.len() != self.width() {
            return Err(SeriesError::ShapeMismatch {
                expected: self.width(),
                got: columns.len(),
            });
        }
        self.columns = columns;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Always false: empty series cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn is_stochastic(&self) -> bool {
        self.n_samples > 1
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn freq(&self) -> Frequency {
        self.index.freq()
    }

    pub fn static_covariates(&self) -> Option<&BTreeMap<String, f64>> {
        self.static_covariates.as_ref()
    }

    pub fn hierarchy(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.hierarchy.as_ref()
    }

    pub fn start_time(&self) -> Timestamp {
        self.time_at(0).unwrap_or(Timestamp::Index(0))
    }

    pub fn end_time(&self) -> Timestamp {
        self.time_at(self.len() - 1).unwrap_or(Timestamp::Index(0))
    }

    pub fn time_at(&self, i: usize) -> Option<Timestamp> {
        self.index.at(i)
    }

    /// All timestamps in order.
    pub fn times(&self) -> Vec<Timestamp> {
        self.index.iter().collect()
    }

    pub fn position_of(&self, ts: Timestamp) -> Option<usize> {
        self.index.position_of(ts)
    }

    /// Raw row-major values.
    pub fn raw_values(&self) -> &[f64] {
        &self.values
    }

    /// All components and samples of one timestamp.
    pub fn row(&self, i: usize) -> &[f64] {
        let stride = self.width() * self.n_samples;
        &self.values[i * stride..(i + 1) * stride]
    }

    /// First sample of component `c` at position `i`.
    pub fn value(&self, i: usize, c: usize) -> f64 {
        self.sample(i, c, 0)
    }

    pub fn sample(&self, i: usize, c: usize, s: usize) -> f64 {
        self.values[(i * self.width() + c) * self.n_samples + s]
    }

    /// First-sample values of one component.
    pub fn component_values(&self, c: usize) -> Vec<f64> {
        (0..self.len()).map(|i| self.value(i, c)).collect()
    }

    /// Values of a univariate series.
    pub fn univariate_values(&self) -> SeriesResult<Vec<f64>> {
        if self.width() != 1 {
            return Err(SeriesError::NotUnivariate(self.width()));
        }
        Ok(self.component_values(0))
    }

    /// Points at positions `[start, end)`.
    pub fn slice_positions(&self, start: usize, end: usize) -> SeriesResult<Self> {
        if start >= end || end > self.len() {
            return Err(SeriesError::OutOfRange(format!(
                "positions {}..{} of a series of length {}",
                start,
                end,
                self.len()
            )));
        }
        let stride = self.width() * self.n_samples;
        Ok(Self {
            index: self.index.slice(start, end),
            columns: self.columns.clone(),
            n_samples: self.n_samples,
            values: self.values[start * stride..end * stride].to_vec(),
            static_covariates: self.static_covariates.clone(),
            hierarchy: self.hierarchy.clone(),
        })
    }

    /// Points strictly before `ts`.
    pub fn drop_after(&self, ts: Timestamp) -> SeriesResult<Self> {
        let count = self.index.count_before(ts);
        self.slice_positions(0, count)
    }

    /// Points strictly after `ts`.
    pub fn drop_before(&self, ts: Timestamp) -> SeriesResult<Self> {
        let count = self.index.count_until(ts);
        self.slice_positions(count, self.len())
    }

    /// Points at or before `ts`.
    pub fn until(&self, ts: Timestamp) -> SeriesResult<Self> {
        let count = self.index.count_until(ts);
        self.slice_positions(0, count)
    }

    /// Last `n` points (the whole series if shorter).
    pub fn tail(&self, n: usize) -> SeriesResult<Self> {
        self.slice_positions(self.len().saturating_sub(n), self.len())
    }

    /// First `n` points (the whole series if shorter).
    pub fn head(&self, n: usize) -> SeriesResult<Self> {
        self.slice_positions(0, n.min(self.len()))
    }

    /// Points of `self` within the time span of `other`.
    pub fn slice_intersect(&self, other: &TimeSeries) -> SeriesResult<Self> {
        let start = self.index.count_before(other.start_time());
        let end = self.index.count_until(other.end_time());
        self.slice_positions(start, end)
    }

    /// Deterministic series holding the per-point median across samples.
    pub fn median_over_samples(&self) -> Self {
        if !self.is_stochastic() {
            return self.clone();
        }
        let values = self
            .values
            .chunks(self.n_samples)
            .map(|samples| Data::new(samples.to_vec()).median())
            .collect();
        Self {
            index: self.index.clone(),
            columns: self.columns.clone(),
            n_samples: 1,
            values,
            static_covariates: self.static_covariates.clone(),
            hierarchy: self.hierarchy.clone(),
        }
    }

    /// Build the `n`-step series that directly follows `input`, with the same columns.
    ///
    /// `values` are row-major `[step][component][sample]`.
    pub fn following(input: &TimeSeries, n: usize, n_samples: usize, values: Vec<f64>) -> SeriesResult<Self> {
        Self::new(input.index.following(n), input.columns.clone(), n_samples, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> TimeSeries {
        TimeSeries::from_values((0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn test_deserialize_validates_shape() {
        let s = series(4);
        let json = serde_json::to_string(&s).unwrap();
        let back: TimeSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["values"] = serde_json::json!([]);
        assert!(serde_json::from_value::<TimeSeries>(value.clone()).is_err());

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["index"]["step"] = serde_json::json!(0);
        assert!(serde_json::from_value::<TimeSeries>(value.clone()).is_err());

        value["index"]["step"] = serde_json::json!(1);
        value["index"]["len"] = serde_json::json!(0);
        assert!(serde_json::from_value::<TimeSeries>(value).is_err());
    }

    #[test]
    fn test_shape_validation() {
        let index = TimeIndex::range(0, 1, 3).unwrap();
        let err = TimeSeries::univariate(index, vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, SeriesError::ShapeMismatch { expected: 3, got: 2 });
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(TimeSeries::from_values(vec![]).unwrap_err(), SeriesError::Empty);
    }

    #[test]
    fn test_drop_after_excludes_point() {
        let s = series(10);
        let head = s.drop_after(Timestamp::Index(4)).unwrap();
        assert_eq!(head.len(), 4);
        assert_eq!(head.end_time(), Timestamp::Index(3));
    }

    #[test]
    fn test_until_includes_point() {
        let s = series(10);
        let head = s.until(Timestamp::Index(4)).unwrap();
        assert_eq!(head.len(), 5);
        assert_eq!(head.end_time(), Timestamp::Index(4));
    }

    #[test]
    fn test_drop_before() {
        let s = series(10);
        let rest = s.drop_before(Timestamp::Index(7)).unwrap();
        assert_eq!(rest.component_values(0), vec![8.0, 9.0]);
    }

    #[test]
    fn test_tail_keeps_timestamps() {
        let s = series(10);
        let tail = s.tail(3).unwrap();
        assert_eq!(tail.start_time(), Timestamp::Index(7));
        assert_eq!(tail.component_values(0), vec![7.0, 8.0, 9.0]);
        assert_eq!(s.tail(50).unwrap().len(), 10);
    }

    #[test]
    fn test_slice_intersect() {
        let s = series(10);
        let other = series(20).slice_positions(5, 15).unwrap();
        let inter = s.slice_intersect(&other).unwrap();
        assert_eq!(inter.start_time(), Timestamp::Index(5));
        assert_eq!(inter.end_time(), Timestamp::Index(9));
    }

    #[test]
    fn test_median_over_samples() {
        let index = TimeIndex::range(0, 1, 2).unwrap();
        let s = TimeSeries::new(index, vec!["a".into()], 3, vec![1.0, 5.0, 3.0, 2.0, 2.0, 8.0]).unwrap();
        assert!(s.is_stochastic());
        let m = s.median_over_samples();
        assert!(!m.is_stochastic());
        assert_eq!(m.component_values(0), vec![3.0, 2.0]);
    }

    #[test]
    fn test_following_index() {
        let s = series(5);
        let f = TimeSeries::following(&s, 2, 1, vec![1.0, 2.0]).unwrap();
        assert_eq!(f.start_time(), Timestamp::Index(5));
        assert_eq!(f.end_time(), Timestamp::Index(6));
    }

    #[test]
    fn test_from_rows_multivariate() {
        let index = TimeIndex::range(0, 1, 2).unwrap();
        let s = TimeSeries::from_rows(
            index,
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 10.0], vec![2.0, 20.0]],
        )
        .unwrap();
        assert_eq!(s.width(), 2);
        assert_eq!(s.component_values(1), vec![10.0, 20.0]);
        assert_eq!(s.row(1), &[2.0, 20.0]);
    }
}
