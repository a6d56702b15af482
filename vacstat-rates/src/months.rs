//! Year-month periods

use chrono::{Datelike, NaiveDate};
use std::fmt;

/// A calendar month, displayed as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Date of `day` in this month, if it exists
    pub fn day(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Every month from the month of `start` through the month of `end`, inclusive
///
/// Empty when `end` lies in an earlier month than `start`.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<YearMonth> {
    let last = YearMonth::of(end);
    let mut current = YearMonth::of(start);
    let mut months = Vec::new();
    while current <= last {
        months.push(current);
        current = current.succ();
    }
    months
}
