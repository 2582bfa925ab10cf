//! CSV loader for time series.
//!
//! Reads a CSV with a header row into a `TimeSeries`:
//! - optional time column: integers become a range index, `%Y-%m-%d` or
//!   `%Y-%m-%d %H:%M:%S` strings a calendar index
//! - one or more numeric value columns (all non-time columns by default)
//!
//! The frequency is inferred from the time column unless given explicitly. Irregular
//! spacing and missing values are rejected.

use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::series::{Frequency, SeriesError, TimeIndex, TimeSeries, Timestamp};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Irregular time index: {0}")]
    Irregular(String),

    #[error("Invalid frequency `{0}`")]
    InvalidFrequency(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Parse a frequency such as `1`, `5` (integer steps), `30s`, `15min`, `h`, `D`, `2W`, `M`.
pub fn parse_frequency(text: &str) -> Result<Frequency, LoaderError> {
    let text = text.trim();
    let split = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (count, unit) = text.split_at(split);
    let n: i64 = if count.is_empty() {
        1
    } else {
        count
            .parse()
            .map_err(|_| LoaderError::InvalidFrequency(text.to_string()))?
    };
    if n <= 0 {
        return Err(LoaderError::InvalidFrequency(text.to_string()));
    }
    let freq = match unit {
        "" => Frequency::Steps(n),
        "s" => Frequency::Seconds(n),
        "min" | "T" => Frequency::Seconds(n * 60),
        "h" | "H" => Frequency::hours(n),
        "D" | "d" => Frequency::days(n),
        "W" | "w" => Frequency::weeks(n),
        "M" | "MS" | "ME" => Frequency::Months(n as u32),
        _ => return Err(LoaderError::InvalidFrequency(text.to_string())),
    };
    Ok(freq)
}

/// Loads time series from CSV files.
#[derive(Debug, Clone, Default)]
pub struct SeriesLoader {
    time_column: Option<String>,
    frequency: Option<Frequency>,
}

impl SeriesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column holding the timestamps. Without one, rows are indexed `0, 1, 2, ...`.
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }

    /// Use this frequency instead of inferring it.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Read a CSV file into a DataFrame.
    pub fn read_csv(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Load `value_columns` (all non-time columns when empty) from a CSV file.
    pub fn load(&self, path: &Path, value_columns: &[String]) -> Result<TimeSeries, LoaderError> {
        let df = self.read_csv(path)?;
        let series = self.frame_to_series(&df, value_columns)?;
        info!(
            "Loaded {} points x {} components from {}",
            series.len(),
            series.width(),
            path.display()
        );
        Ok(series)
    }

    /// Build a series from an in-memory DataFrame.
    pub fn frame_to_series(&self, df: &DataFrame, value_columns: &[String]) -> Result<TimeSeries, LoaderError> {
        if df.height() == 0 {
            return Err(LoaderError::InvalidData("no rows".to_string()));
        }

        let columns = if value_columns.is_empty() {
            self.remaining_columns(df, &[])
        } else {
            value_columns.to_vec()
        };
        if columns.is_empty() {
            return Err(LoaderError::InvalidData("no value columns".to_string()));
        }

        let index = match &self.time_column {
            Some(name) => self.time_index(df.column(name)?)?,
            None => {
                let freq = self.frequency.unwrap_or(Frequency::Steps(1));
                TimeIndex::new(Timestamp::Index(0), freq, df.height()).ok_or_else(|| {
                    LoaderError::InvalidData(format!("{} does not fit an integer index", freq))
                })?
            }
        };

        let mut component_values = Vec::with_capacity(columns.len());
        for name in &columns {
            let cast = df.column(name)?.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| {
                        LoaderError::InvalidData(format!("missing value in `{}` at row {}", name, row))
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            component_values.push(values);
        }

        let rows = (0..df.height())
            .map(|i| component_values.iter().map(|c| c[i]).collect())
            .collect();
        Ok(TimeSeries::from_rows(index, columns, rows)?)
    }

    /// Columns other than the time column and `exclude`, in file order.
    pub fn remaining_columns(&self, df: &DataFrame, exclude: &[String]) -> Vec<String> {
        df.get_column_names()
            .into_iter()
            .filter(|name| Some(*name) != self.time_column.as_deref())
            .filter(|name| !exclude.iter().any(|e| e == name))
            .map(|name| name.to_string())
            .collect()
    }

    fn time_index(&self, column: &Series) -> Result<TimeIndex, LoaderError> {
        let times: Vec<Timestamp> = if column.dtype().is_integer() {
            let cast = column.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| {
                    v.map(Timestamp::Index)
                        .ok_or_else(|| LoaderError::InvalidData("missing time value".to_string()))
                })
                .collect::<Result<_, _>>()?
        } else {
            column
                .str()?
                .into_iter()
                .map(|v| {
                    let text =
                        v.ok_or_else(|| LoaderError::InvalidData("missing time value".to_string()))?;
                    parse_datetime(text).map(Timestamp::DateTime)
                })
                .collect::<Result<_, _>>()?
        };

        let freq = match self.frequency {
            Some(freq) => freq,
            None => infer_frequency(&times)?,
        };
        let index = TimeIndex::new(times[0], freq, times.len()).ok_or_else(|| {
            LoaderError::Irregular(format!("frequency {} does not match {}", freq, times[0]))
        })?;

        if let Some((i, ts)) = times
            .iter()
            .enumerate()
            .find(|(i, ts)| index.at(*i) != Some(**ts))
        {
            return Err(LoaderError::Irregular(format!(
                "row {} has time {} but {} was expected with frequency {}",
                i,
                ts,
                index.at(i).map_or("nothing".to_string(), |t| t.to_string()),
                freq
            )));
        }
        Ok(index)
    }
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, LoaderError> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| LoaderError::InvalidData(format!("cannot parse time `{}`", text)))
}

/// Infer the frequency from the first two timestamps. A calendar series whose first
/// step is a whole number of months is monthly.
fn infer_frequency(times: &[Timestamp]) -> Result<Frequency, LoaderError> {
    let (first, second) = match times {
        [] => return Err(LoaderError::InvalidData("no rows".to_string())),
        [Timestamp::Index(_)] => return Ok(Frequency::Steps(1)),
        [Timestamp::DateTime(_)] => return Ok(Frequency::days(1)),
        [a, b, ..] => (*a, *b),
    };
    match (first, second) {
        (Timestamp::Index(a), Timestamp::Index(b)) if b > a => Ok(Frequency::Steps(b - a)),
        (Timestamp::DateTime(a), Timestamp::DateTime(b)) if b > a => {
            let months = month_number(&b) - month_number(&a);
            if months > 0 {
                // Jan 31 -> Feb 29 -> Mar 31 is monthly, not a fixed duration
                let monthly = Frequency::Months(months as u32);
                if times
                    .iter()
                    .enumerate()
                    .all(|(i, ts)| monthly.advance(first, i as i64) == Some(*ts))
                {
                    return Ok(monthly);
                }
            }
            Ok(Frequency::Seconds((b - a).num_seconds()))
        }
        _ => Err(LoaderError::Irregular(format!(
            "time values must increase, got {} then {}",
            first, second
        ))),
    }
}

fn month_number(dt: &NaiveDateTime) -> i64 {
    dt.year() as i64 * 12 + dt.month0() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_integer_index() {
        let file = write_csv("t,y\n10,1.0\n12,2.0\n14,4.5\n");
        let series = SeriesLoader::new()
            .with_time_column("t")
            .load(file.path(), &[])
            .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.freq(), Frequency::Steps(2));
        assert_eq!(series.start_time(), Timestamp::Index(10));
        assert_eq!(series.component_values(0), vec![1.0, 2.0, 4.5]);
        assert_eq!(series.columns(), &["y".to_string()]);
    }

    #[test]
    fn test_daily_dates() {
        let file = write_csv("date,a,b\n2024-01-01,1,10\n2024-01-02,2,20\n2024-01-03,3,30\n");
        let series = SeriesLoader::new()
            .with_time_column("date")
            .load(file.path(), &["b".to_string()])
            .unwrap();
        assert_eq!(series.width(), 1);
        assert_eq!(series.freq(), Frequency::days(1));
        assert_eq!(series.end_time(), Timestamp::date(2024, 1, 3).unwrap());
        assert_eq!(series.component_values(0), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_month_end_dates() {
        let file = write_csv("date,y\n2024-01-31,1\n2024-02-29,2\n2024-03-31,3\n2024-04-30,4\n");
        let series = SeriesLoader::new()
            .with_time_column("date")
            .load(file.path(), &[])
            .unwrap();
        assert_eq!(series.freq(), Frequency::Months(1));
        assert_eq!(series.end_time(), Timestamp::date(2024, 4, 30).unwrap());
    }

    #[test]
    fn test_irregular_spacing_rejected() {
        let file = write_csv("t,y\n0,1\n1,2\n3,3\n");
        let err = SeriesLoader::new()
            .with_time_column("t")
            .load(file.path(), &[])
            .unwrap_err();
        assert!(matches!(err, LoaderError::Irregular(_)));
    }

    #[test]
    fn test_without_time_column() {
        let file = write_csv("y,z\n1,2\n3,4\n");
        let series = SeriesLoader::new().load(file.path(), &[]).unwrap();
        assert_eq!(series.width(), 2);
        assert_eq!(series.start_time(), Timestamp::Index(0));
        assert_eq!(series.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_missing_file() {
        let err = SeriesLoader::new()
            .load(Path::new("/nonexistent/series.csv"), &[])
            .unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency("D").unwrap(), Frequency::days(1));
        assert_eq!(parse_frequency("2W").unwrap(), Frequency::weeks(2));
        assert_eq!(parse_frequency("15min").unwrap(), Frequency::Seconds(900));
        assert_eq!(parse_frequency("3").unwrap(), Frequency::Steps(3));
        assert_eq!(parse_frequency("M").unwrap(), Frequency::Months(1));
        assert!(parse_frequency("0D").is_err());
        assert!(parse_frequency("fortnight").is_err());
    }
}
