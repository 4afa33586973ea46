//! Time helpers for the digest.
//!
//! This module provides the date arithmetic the digest is built on:
//! [`normalized_annual_date`] for comparing yearly events across stored
//! years, [`whole_years_between`] and [`days_until`] for birthday lines, and
//! [`TimeWindow`] for the range calendars are queried with.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Projects `date` onto `year`, keeping month, day, time-of-day and offset.
///
/// February 29 becomes February 28 when `year` is not a leap year.
pub fn normalized_annual_date(date: DateTime<FixedOffset>, year: i32) -> DateTime<FixedOffset> {
    let day = normalized_annual_day(date.date_naive(), year);
    let local = day.and_time(date.time());
    date.offset()
        .from_local_datetime(&local)
        .single()
        .unwrap_or(date)
}

/// Projects a calendar date onto `year`.
///
/// This is the sort and grouping key for yearly events. February 29 maps to
/// February 28 in non-leap years.
pub fn normalized_annual_day(date: NaiveDate, year: i32) -> NaiveDate {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// Returns the number of whole years from `earlier` to `later`.
///
/// Negative spans yield 0.
pub fn whole_years_between(earlier: NaiveDate, later: NaiveDate) -> u32 {
    later.years_since(earlier).unwrap_or(0)
}

/// Returns the ceiling of the fractional number of days from `now` to `target`.
///
/// Anything later today (even one second ahead) counts as one day; a target
/// that already passed yields zero or a negative number.
pub fn days_until(target: DateTime<FixedOffset>, now: DateTime<Utc>) -> i64 {
    let seconds = (target.with_timezone(&Utc) - now).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).ceil() as i64
}

/// A time window for querying calendar data.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates the window a digest covers: from midnight today in `now`'s
    /// timezone until `days` days after `now`.
    pub fn upcoming_days<Tz: TimeZone>(now: DateTime<Tz>, days: u32) -> Self {
        let tz = now.timezone();
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let start = tz
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc));
        let end = now.with_timezone(&Utc) + Duration::days(i64::from(days));
        Self { start, end }
    }
}
