//! Time index for series.
//!
//! An index is an anchor timestamp, a frequency, an offset and a length. Positions are
//! always resolved from the anchor, so slicing a monthly index never drifts month-end
//! dates (Jan 31 -> Feb 29 -> Mar 31, not Mar 29).

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A point on a time axis: integer position or calendar date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timestamp {
    /// Integer (range) index value.
    Index(i64),
    /// Calendar date-time.
    DateTime(NaiveDateTime),
}

impl Timestamp {
    /// Midnight of the given date.
    pub fn date(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Timestamp::DateTime)
    }

    pub fn is_datetime(&self) -> bool {
        matches!(self, Self::DateTime(_))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self::Index(value)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Integer step between consecutive index values.
    Steps(i64),
    /// Fixed calendar duration in seconds (hours, days, weeks).
    Seconds(i64),
    /// Calendar months, clamped to the last day of shorter months.
    Months(u32),
}

impl Frequency {
    pub fn hours(n: i64) -> Self {
        Self::Seconds(n * 3_600)
    }

    pub fn days(n: i64) -> Self {
        Self::Seconds(n * 86_400)
    }

    pub fn weeks(n: i64) -> Self {
        Self::Seconds(n * 7 * 86_400)
    }

    /// Whether the frequency belongs to a calendar index.
    pub fn is_calendar(&self) -> bool {
        !matches!(self, Self::Steps(_))
    }

    /// Whether the frequency is strictly positive.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Steps(s) | Self::Seconds(s) => *s > 0,
            Self::Months(m) => *m > 0,
        }
    }

    /// This frequency repeated `factor` times (e.g. base step times stride).
    pub fn scaled(&self, factor: usize) -> Self {
        let k = factor as i64;
        match self {
            Self::Steps(s) => Self::Steps(s * k),
            Self::Seconds(s) => Self::Seconds(s * k),
            Self::Months(m) => Self::Months(m * factor as u32),
        }
    }

    /// Move `ts` by `n` periods. `None` if the timestamp kind does not match or on overflow.
    pub fn advance(&self, ts: Timestamp, n: i64) -> Option<Timestamp> {
        match (self, ts) {
            (Self::Steps(s), Timestamp::Index(i)) => {
                s.checked_mul(n).and_then(|d| i.checked_add(d)).map(Timestamp::Index)
            }
            (Self::Seconds(s), Timestamp::DateTime(dt)) => s
                .checked_mul(n)
                .and_then(Duration::try_seconds)
                .and_then(|d| dt.checked_add_signed(d))
                .map(Timestamp::DateTime),
            (Self::Months(m), Timestamp::DateTime(dt)) => {
                let months = (*m as i64).checked_mul(n)?;
                let date = add_months(dt.date(), months)?;
                Some(Timestamp::DateTime(date.and_time(dt.time())))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steps(s) => write!(f, "{} step(s)", s),
            Self::Seconds(s) if s % 86_400 == 0 => write!(f, "{} day(s)", s / 86_400),
            Self::Seconds(s) => write!(f, "{} second(s)", s),
            Self::Months(m) => write!(f, "{} month(s)", m),
        }
    }
}

/// Add months to a date, clamping the day to the target month's length.
fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + (date.month0() as i64) + months;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = total.rem_euclid(12) as u32 + 1;

    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Get the number of days in a month.
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

/// Check if a year is a leap year.
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Regularly spaced time index.
///
/// `offset` and `step` count base periods of `freq` from the anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeIndex {
    anchor: Timestamp,
    freq: Frequency,
    offset: i64,
    #[serde(default = "unit_step")]
    step: i64,
    len: usize,
}

fn unit_step() -> i64 {
    1
}

impl TimeIndex {
    /// Create an index of `len` points starting at `start`.
    ///
    /// Returns `None` when the frequency is not positive or does not match the timestamp
    /// kind (`Steps` with `Index`, `Seconds`/`Months` with `DateTime`).
    pub fn new(start: Timestamp, freq: Frequency, len: usize) -> Option<Self> {
        if !freq.is_valid() || freq.is_calendar() != start.is_datetime() {
            return None;
        }
        Some(Self {
            anchor: start,
            freq,
            offset: 0,
            step: 1,
            len,
        })
    }

    /// Integer index `start, start + step, ...`.
    pub fn range(start: i64, step: i64, len: usize) -> Option<Self> {
        Self::new(Timestamp::Index(start), Frequency::Steps(step), len)
    }

    /// Whether the frequency matches the anchor kind and every position resolves.
    pub fn is_well_formed(&self) -> bool {
        self.freq.is_valid()
            && self.freq.is_calendar() == self.anchor.is_datetime()
            && self.step > 0
            && (self.is_empty() || self.at(self.len - 1).is_some())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spacing between consecutive points.
    pub fn freq(&self) -> Frequency {
        if self.step == 1 {
            self.freq
        } else {
            self.freq.scaled(self.step as usize)
        }
    }

    pub fn is_datetime(&self) -> bool {
        self.anchor.is_datetime()
    }

    /// Timestamp at position `i`. Positions past the end are extrapolated.
    pub fn at(&self, i: usize) -> Option<Timestamp> {
        let periods = (i as i64).checked_mul(self.step)?.checked_add(self.offset)?;
        self.freq.advance(self.anchor, periods)
    }

    pub fn start(&self) -> Option<Timestamp> {
        if self.is_empty() {
            return None;
        }
        self.at(0)
    }

    pub fn end(&self) -> Option<Timestamp> {
        if self.is_empty() {
            return None;
        }
        self.at(self.len - 1)
    }

    /// Number of points strictly before `ts`.
    pub fn count_before(&self, ts: Timestamp) -> usize {
        let (mut lo, mut hi) = (0usize, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.at(mid) {
                Some(t) if t < ts => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }

    /// Number of points at or before `ts`.
    pub fn count_until(&self, ts: Timestamp) -> usize {
        let before = self.count_before(ts);
        if self.at(before) == Some(ts) && before < self.len {
            before + 1
        } else {
            before
        }
    }

    /// Position of an exact timestamp.
    pub fn position_of(&self, ts: Timestamp) -> Option<usize> {
        let pos = self.count_before(ts);
        (pos < self.len && self.at(pos) == Some(ts)).then_some(pos)
    }

    /// Sub-index of positions `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len);
        let start = start.min(end);
        Self {
            anchor: self.anchor,
            freq: self.freq,
            offset: self.offset + start as i64 * self.step,
            step: self.step,
            len: end - start,
        }
    }

    /// Index of `n` points directly following this one.
    pub fn following(&self, n: usize) -> Self {
        Self {
            anchor: self.anchor,
            freq: self.freq,
            offset: self.offset + self.len as i64 * self.step,
            step: self.step,
            len: n,
        }
    }

    /// `len` points taking every `stride`-th position from `start`. Positions past the
    /// end are extrapolated from the same anchor, so month-end dates stay month-end.
    pub fn strided(&self, start: usize, stride: usize, len: usize) -> Option<Self> {
        if stride == 0 {
            return None;
        }
        Some(Self {
            anchor: self.anchor,
            freq: self.freq,
            offset: self.offset + start as i64 * self.step,
            step: self.step * stride as i64,
            len,
        })
    }

    /// Iterate over all timestamps.
    pub fn iter(&self) -> impl Iterator<Item = Timestamp> + '_ {
        (0..self.len).filter_map(move |i| self.at(i))
    }
}

impl PartialEq for TimeIndex {
    fn eq(&self, other: &Self) -> bool {
        self.freq() == other.freq()
            && self.len == other.len
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
