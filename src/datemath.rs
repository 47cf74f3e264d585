//! Calendar arithmetic on the proleptic Gregorian calendar.
//!
//! All functions are pure. Date construction and weekday lookup are
//! delegated to `chrono`; the interval decomposition walks whole months
//! first and then counts the remaining days.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use std::fmt;

/// Returns true if `year` is a leap year.
///
/// Divisible by 400 is leap, otherwise divisible by 100 is not,
/// otherwise divisible by 4 is leap.
pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 100 != 0 && year % 4 == 0)
}

/// Build a calendar date from raw client integers.
///
/// Returns `None` for anything that is not a real date, including
/// negative month/day values and years outside chrono's range.
pub fn calendar_date(year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Returns true if the triple forms a real calendar date.
pub fn is_valid_date(year: i32, month: i32, day: i32) -> bool {
    calendar_date(year, month, day).is_some()
}

/// Elapsed calendar period between two dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} year(s) {} month(s) {} day(s)",
            self.years, self.months, self.days
        )
    }
}

/// Decompose the period between `a` and `b` into years, months and days.
///
/// The earlier date is always taken as the start, so the result does not
/// depend on argument order.
pub fn interval_between(a: NaiveDate, b: NaiveDate) -> Interval {
    let (start, end) = if a <= b { (a, b) } else { (b, a) };

    let mut total_months = (end.year() - start.year()) * 12 + end.month() as i32
        - start.month() as i32;
    let mut days = i64::from(end.day()) - i64::from(start.day());

    if total_months > 0 && days < 0 {
        // Last month is incomplete: step back one and count days from the
        // month anchor (clamped to the end of shorter months).
        total_months -= 1;
        let anchor = start + Months::new(total_months as u32);
        days = (end - anchor).num_days();
    }

    Interval {
        years: (total_months / 12) as u32,
        months: (total_months % 12) as u32,
        days: days as u32,
    }
}

/// Weekday of a valid date.
pub fn day_of_week(date: NaiveDate) -> Weekday {
    date.weekday()
}

/// Upper-case English weekday name as sent on the wire.
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}
