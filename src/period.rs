use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::DueDatePolicy;
use crate::errors::{DuesError, Result};
use crate::types::Periodicity;

/// first day of the billing interval a due covers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Period(NaiveDate);

impl Period {
    /// wrap a date, which must be the first day of a month
    pub fn new(date: NaiveDate) -> Result<Self> {
        if date.day() != 1 {
            return Err(DuesError::InvalidPeriod { date });
        }
        Ok(Period(date))
    }

    /// period starting at the given year and month
    pub fn from_ymd(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Period)
            .ok_or(DuesError::InvalidDate {
                message: format!("no such month: {year}-{month:02}"),
            })
    }

    /// first day of the interval
    pub fn start(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// the following billing period for the given periodicity
    pub fn next(&self, periodicity: Periodicity) -> Period {
        Period(self.0 + Months::new(periodicity.months()))
    }

    /// due date for this period under the given policy.
    ///
    /// Pure and stable: same inputs always give the same date, which keeps
    /// generation idempotent.
    pub fn due_date(&self, periodicity: Periodicity, policy: DueDatePolicy) -> NaiveDate {
        let following = self.0 + Months::new(periodicity.months());
        match policy {
            // `following` is a first-of-month date, so +9 days lands on the 10th
            DueDatePolicy::TenthOfFollowingPeriod => following + Duration::days(9),
            DueDatePolicy::EndOfPeriod => following - Duration::days(1),
        }
    }

    /// exclusive end of an aggregation window spanning `months` from this period
    pub fn window_end(&self, months: u32) -> NaiveDate {
        self.0 + Months::new(months)
    }

    /// whether the given period date falls inside the window
    pub fn contains(&self, period_start: NaiveDate, months: u32) -> bool {
        period_start >= self.0 && period_start < self.window_end(months)
    }

    /// display label, e.g. "2024-03"
    pub fn label(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
