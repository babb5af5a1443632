//! Week-boundary arithmetic. Every date that keys an assignment or a
//! forecast column is snapped to the Monday of its week first; the crate
//! never compares raw dates.

use crate::error::{KennelError, Result};
use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn add_weeks(date: NaiveDate, weeks: i64) -> NaiveDate {
    date + Duration::weeks(weeks)
}

/// Whole weeks from `start`'s week to `end`'s week. Negative when `end`
/// is earlier.
pub fn weeks_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (monday_of(end) - monday_of(start)).num_days() / 7
}

/// `count` consecutive Monday week-starts beginning with `start`'s week.
pub fn week_starts(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let monday = monday_of(start);
    (0..i64::from(count)).map(|i| add_weeks(monday, i)).collect()
}

/// Strict `YYYY-MM-DD` parsing for dates arriving from the boundary.
pub fn parse_week_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| KennelError::InvalidWeekDate(s.to_string()))
}

pub fn format_week_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monday_of_every_weekday() {
        let monday = d(2024, 3, 4);
        for offset in 0..7 {
            assert_eq!(monday_of(monday + Duration::days(offset)), monday);
        }
    }

    #[test]
    fn monday_of_sunday_snaps_back_not_forward() {
        assert_eq!(monday_of(d(2024, 3, 10)), d(2024, 3, 4));
    }

    #[test]
    fn monday_is_fixed_point() {
        assert_eq!(monday_of(d(2024, 1, 1)), d(2024, 1, 1));
    }

    #[test]
    fn weeks_between_normalizes_both_sides() {
        assert_eq!(weeks_between(d(2024, 3, 6), d(2024, 3, 22)), 2);
        assert_eq!(weeks_between(d(2024, 3, 22), d(2024, 3, 6)), -2);
        assert_eq!(weeks_between(d(2024, 3, 4), d(2024, 3, 10)), 0);
    }

    #[test]
    fn week_starts_generates_consecutive_mondays() {
        let weeks = week_starts(d(2024, 2, 28), 3);
        assert_eq!(weeks, vec![d(2024, 2, 26), d(2024, 3, 4), d(2024, 3, 11)]);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(parse_week_date("2024-03-04").unwrap(), d(2024, 3, 4));
        assert!(parse_week_date("03/04/2024").is_err());
        assert!(parse_week_date("2024-13-01").is_err());
        assert!(parse_week_date("").is_err());
    }

    #[test]
    fn format_is_parse_inverse() {
        let date = d(2024, 12, 30);
        assert_eq!(parse_week_date(&format_week_date(date)).unwrap(), date);
    }
}
