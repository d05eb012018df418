use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// A calendar date with no time-of-day component.
///
/// Every constructor drops the time part, so equality and ordering on `Day`
/// only ever look at year, month and day-of-month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(NaiveDate);

impl Day {
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self(dt.date_naive())
    }

    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    /// Day of month, starting at 1.
    #[must_use]
    pub fn ordinal(self) -> u32 {
        self.0.day()
    }

    /// The following day, or `None` past the last representable date.
    #[must_use]
    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// The preceding day, or `None` before the first representable date.
    #[must_use]
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    #[must_use]
    pub fn first_of_month(self) -> Self {
        Self(self.0.with_day(1).unwrap_or(self.0))
    }

    #[must_use]
    pub fn add_months(self, months: u32) -> Self {
        Self(
            self.0
                .checked_add_months(Months::new(months))
                .unwrap_or(NaiveDate::MAX),
        )
    }

    #[must_use]
    pub fn compare(self, other: Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl From<NaiveDateTime> for Day {
    fn from(dt: NaiveDateTime) -> Self {
        Self(dt.date())
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Inclusive valid interval. `min > max` is accepted as-is and simply
/// leaves every day out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Day,
    pub max: Day,
}

impl Bounds {
    #[must_use]
    pub fn new(min: Day, max: Day) -> Self {
        Self { min, max }
    }

    /// Today through six months from today.
    #[must_use]
    pub fn from_today(today: Day) -> Self {
        Self {
            min: today,
            max: today.add_months(6),
        }
    }

    #[must_use]
    pub fn is_out_of_bounds(&self, day: Day) -> bool {
        day < self.min || day > self.max
    }
}
