//! Lesson-date resolution for weekly-recurring group schedules.
//!
//! A group meets on a fixed set of weekdays between a start and end date.
//! The resolver is a pure function over those inputs; nothing is cached,
//! every request recomputes (ranges are bounded to a school term).

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::ApiError;

/// Wire format for attendance dates, matching the read path exactly.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

pub fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| ApiError::validation("invalid date format, use dd.mm.yyyy"))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Case-insensitive weekday name lookup.
pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parses a day-pattern from wire/storage names, rejecting unknown labels.
pub fn parse_day_names(names: &[String]) -> Result<HashSet<Weekday>, ApiError> {
    names
        .iter()
        .map(|n| {
            weekday_from_name(n).ok_or_else(|| ApiError::validation(format!("unknown day: {n}")))
        })
        .collect()
}

/// Every date in `[start, end]` whose weekday is in `days`, ascending.
///
/// An empty day set yields an empty sequence; `start > end` yields an empty
/// sequence as well (the range is the caller's invariant to uphold).
pub fn lesson_dates(start: NaiveDate, end: NaiveDate, days: &HashSet<Weekday>) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| days.contains(&d.weekday()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn days(names: &[&str]) -> HashSet<Weekday> {
        names.iter().map(|n| weekday_from_name(n).unwrap()).collect()
    }

    #[test]
    fn monday_wednesday_term() {
        let got = lesson_dates(date(2024, 1, 1), date(2024, 1, 10), &days(&["monday", "wednesday"]));
        assert_eq!(
            got,
            vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 8), date(2024, 1, 10)]
        );
    }

    #[test]
    fn empty_day_set_yields_nothing() {
        assert!(lesson_dates(date(2024, 1, 1), date(2024, 12, 31), &HashSet::new()).is_empty());
    }

    #[test]
    fn single_day_range() {
        // 2024-01-01 is a Monday
        let start = date(2024, 1, 1);
        assert_eq!(lesson_dates(start, start, &days(&["monday"])), vec![start]);
        assert!(lesson_dates(start, start, &days(&["tuesday"])).is_empty());
    }

    #[test]
    fn inverted_range_yields_nothing() {
        assert!(lesson_dates(date(2024, 2, 1), date(2024, 1, 1), &days(&["monday"])).is_empty());
    }

    #[test]
    fn output_is_sorted_in_range_and_on_pattern() {
        let start = date(2024, 3, 1);
        let end = date(2024, 5, 31);
        let pattern = days(&["tuesday", "friday", "sunday"]);
        let got = lesson_dates(start, end, &pattern);

        assert!(got.windows(2).all(|w| w[0] < w[1]));
        assert!(got.iter().all(|d| *d >= start && *d <= end));
        assert!(got.iter().all(|d| pattern.contains(&d.weekday())));

        // converse: every in-range date on the pattern is present exactly once
        let expected = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| pattern.contains(&d.weekday()))
            .count();
        assert_eq!(got.len(), expected);
    }

    #[test]
    fn weekday_names_are_case_insensitive() {
        assert_eq!(weekday_from_name("Monday"), Some(Weekday::Mon));
        assert_eq!(weekday_from_name("SUNDAY"), Some(Weekday::Sun));
        assert_eq!(weekday_from_name("mon"), None);
        assert_eq!(weekday_from_name(""), None);
    }

    #[test]
    fn day_name_parsing_rejects_unknown_labels() {
        let ok = parse_day_names(&["Monday".into(), "friday".into()]).unwrap();
        assert_eq!(ok, days(&["monday", "friday"]));
        assert!(parse_day_names(&["monday".into(), "someday".into()]).is_err());
    }

    #[test]
    fn wire_dates_round_trip() {
        let d = date(2024, 1, 3);
        assert_eq!(format_date(d), "03.01.2024");
        assert_eq!(parse_date("03.01.2024").unwrap(), d);
    }

    #[test]
    fn bad_wire_dates_are_validation_errors() {
        for s in ["2024-01-03", "3.13.2024", "31.02.2024", "not a date", ""] {
            assert!(matches!(parse_date(s), Err(ApiError::Validation(_))), "{s}");
        }
    }
}
